//! OpenAI-compatible Chat Completions client
//!
//! One client type covers every registry provider (DeepSeek, Zhipu, Groq,
//! Mistral, OpenAI): they all expose the same wire protocol under
//! different base URLs. The client is bound to a single model at
//! construction time.
//!
//! Streaming: the HTTP response's byte stream is decoded with
//! [`SseDecoder`](super::sse::SseDecoder) on a spawned task that forwards
//! [`UpstreamEvent`]s over an mpsc channel. Frames that fail to parse are
//! logged and dropped, never propagated.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::sse::{DONE_SENTINEL, SseDecoder};
use super::{ChatClient, ChatRequest, ChatResponse, ToolCall, UpstreamEvent, Usage};

/// Chat client for one (provider endpoint, model) pair.
pub struct ChatApiClient {
    http: HttpClient,
    provider: String,
    base_url: String,
    api_key: String,
    /// Model name as the API expects it (no provider prefix).
    model: String,
}

impl ChatApiClient {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: HttpClient::new(),
            provider: provider.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> CompletionRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| WireTool {
                        tool_type: "function".into(),
                        function: WireFunction {
                            name: t.name.clone(),
                            description: Some(t.description.clone()),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        CompletionRequest {
            model: self.model.clone(),
            messages,
            tools,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn post(&self, body: &CompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("(failed to read body: {e})"));
            anyhow::bail!("{} API error {}: {}", self.provider, status, text);
        }
        Ok(response)
    }

    /// Drive the SSE byte stream and forward events until the stream ends,
    /// a frame carries an error, or the receiver goes away.
    async fn relay_sse_stream(response: reqwest::Response, tx: mpsc::Sender<UpstreamEvent>) {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.send(UpstreamEvent::StreamError(e.to_string())).await;
                    return;
                }
            };

            for payload in decoder.feed(&chunk) {
                if payload == DONE_SENTINEL {
                    return;
                }

                let frame: StreamChunk = match serde_json::from_str(&payload) {
                    Ok(f) => f,
                    Err(e) => {
                        debug!(error = %e, "dropping unparseable stream frame");
                        continue;
                    }
                };

                for choice in frame.choices {
                    if let Some(content) = choice.delta.content
                        && tx.send(UpstreamEvent::ContentDelta(content)).await.is_err()
                    {
                        return;
                    }
                    if let Some(reasoning) = choice.delta.reasoning_content
                        && tx
                            .send(UpstreamEvent::ThinkingDelta(reasoning))
                            .await
                            .is_err()
                    {
                        return;
                    }
                }

                if let Some(usage) = frame.usage
                    && tx
                        .send(UpstreamEvent::Metadata(usage.into()))
                        .await
                        .is_err()
                {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ChatClient for ChatApiClient {
    async fn execute(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(&request, false);
        let response = self.post(&body).await?;
        let result: CompletionResponse = response.json().await?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("{}: no choices in response", self.provider))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                call_id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: result.usage.map(Into::into),
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<mpsc::Receiver<UpstreamEvent>> {
        let body = self.build_body(&request, true);
        // A failed request surfaces here as Err before any event flows:
        // the caller gets its first-chunk failure without consuming a
        // stream.
        let response = self.post(&body).await?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(Self::relay_sse_stream(response, tx));
        Ok(rx)
    }
}

// ============================================================================
// Wire types (Chat Completions format)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    /// Raw JSON string per the wire protocol.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        let total = if u.total_tokens > 0 {
            u.total_tokens
        } else {
            u.prompt_tokens + u.completion_tokens
        };
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: total,
        }
    }
}

// Streaming wire types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_parses_content_delta() {
        let frame: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(frame.choices[0].delta.content.as_deref(), Some("Hi"));
        assert!(frame.usage.is_none());
    }

    #[test]
    fn test_stream_chunk_parses_reasoning_delta() {
        let frame: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#)
                .unwrap();
        assert_eq!(
            frame.choices[0].delta.reasoning_content.as_deref(),
            Some("hmm")
        );
    }

    #[test]
    fn test_usage_only_final_frame() {
        let frame: StreamChunk = serde_json::from_str(
            r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
        )
        .unwrap();
        let usage: Usage = frame.usage.unwrap().into();
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total_tokens, 12);
    }

    #[test]
    fn test_usage_total_computed_when_absent() {
        let wire: WireUsage =
            serde_json::from_str(r#"{"prompt_tokens":3,"completion_tokens":4}"#).unwrap();
        let usage: Usage = wire.into();
        assert_eq!(usage.total_tokens, 7);
    }

    #[test]
    fn test_request_body_shape() {
        let client = ChatApiClient::new("deepseek", "https://api.deepseek.com/v1", "k", "deepseek-chat");
        let body = client.build_body(
            &ChatRequest {
                messages: vec![crate::provider::Message::system("s")],
                tools: vec![],
                temperature: 0.7,
                max_tokens: 2048,
            },
            true,
        );
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "deepseek-chat");
        assert_eq!(v["stream"], true);
        assert_eq!(v["stream_options"]["include_usage"], true);
        assert!(v.get("tools").is_none());
    }

    #[test]
    fn test_endpoint_join() {
        let client = ChatApiClient::new("groq", "https://api.groq.com/openai/v1", "k", "m");
        assert_eq!(
            client.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
