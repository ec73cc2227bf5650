//! Web search capability for evidence-backed debate turns
//!
//! Backed by the Tavily API; enabled only when `TAVILY_API_KEY` is set.
//! Search failures never abort a round - the round runner substitutes a
//! textual failure digest instead.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::provider::ToolDefinition;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-source snippet cap keeps the digest bounded.
const SNIPPET_MAX_CHARS: usize = 300;
const MAX_RESULTS: usize = 3;

/// Outcome of one web search, formatted for prompt injection.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub query: String,
    pub results: String,
}

/// Search capability consumed by the round runner.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResult>;
}

/// Tool definition handed to the model during the probe call.
pub fn web_search_tool() -> ToolDefinition {
    ToolDefinition {
        name: "web_search".to_string(),
        description: "Search the web for factual evidence, statistics, news, or data \
                      to support your argument. Use specific, factual queries."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query - be specific and factual, \
                                    e.g. 'AI job displacement statistics 2025'"
                }
            },
            "required": ["query"]
        }),
    }
}

/// Tavily-backed search client.
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchResult> {
        tracing::info!(query, "web search");

        let response = self
            .http
            .post(TAVILY_URL)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "basic",
                "include_answer": true,
                "max_results": MAX_RESULTS,
            }))
            .send()
            .await?
            .error_for_status()?;

        let data: TavilyResponse = response.json().await?;

        Ok(SearchResult {
            query: query.to_string(),
            results: format_digest(&data),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

fn format_digest(data: &TavilyResponse) -> String {
    let mut sections = Vec::new();

    if let Some(answer) = data.answer.as_deref().filter(|a| !a.is_empty()) {
        sections.push(format!("Direct Answer: {answer}\n"));
    }

    for hit in data.results.iter().take(MAX_RESULTS) {
        let snippet: String = hit.content.chars().take(SNIPPET_MAX_CHARS).collect();
        sections.push(format!("Source: {}\n{}\nURL: {}\n", hit.title, snippet, hit.url));
    }

    if sections.is_empty() {
        "No relevant results found.".to_string()
    } else {
        sections.join("\n")
    }
}
