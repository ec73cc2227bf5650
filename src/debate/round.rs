//! Round execution
//!
//! Drives one turn - a side's phase statement or the judge's ruling - as a
//! spawned task that forwards normalized [`RoundEvent`]s over a channel
//! and resolves to the turn's fully accumulated text. The accumulator
//! lives inside the task, scoped to the one turn.
//!
//! Failure semantics: a typed stream error is forwarded and ends the
//! round; an upstream exception (network, protocol, non-2xx) is logged,
//! synthesized into an error event, and ends the round the same way. In
//! both cases the task resolves to `None` and the caller discards the
//! turn. A closed event channel means the client went away: the task
//! stops without issuing further upstream calls.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::events::{RoundEvent, normalize};
use super::prompt::{build_judge_prompt, build_side_prompt, build_side_prompt_with_tools};
use super::{
    DebatePhase, JUDGE_MAX_TOKENS, JUDGE_TEMPERATURE, Position, SIDE_MAX_TOKENS, SIDE_TEMPERATURE,
    TranscriptEntry,
};
use crate::provider::{ChatClient, ChatRequest, ClientHandle, Message};
use crate::search::{SearchProvider, SearchResult, web_search_tool};

/// A running turn: its event stream plus the eventual accumulated content
/// (`None` when the turn failed).
pub struct RoundExecution {
    pub events: mpsc::Receiver<RoundEvent>,
    pub outcome: JoinHandle<Option<String>>,
}

const ROUND_CHANNEL_CAPACITY: usize = 64;

/// Execute one side turn with plain streaming (no tool calling).
pub fn execute_debate_round(
    handle: ClientHandle,
    side: Position,
    phase: DebatePhase,
    topic: String,
    transcript: Vec<TranscriptEntry>,
) -> RoundExecution {
    let (tx, rx) = mpsc::channel(ROUND_CHANNEL_CAPACITY);
    let outcome = tokio::spawn(async move {
        let messages = build_side_prompt(side, phase, &topic, &transcript);
        let mut content = String::new();
        let result =
            relay_stream(&handle.client, side_request(messages), &tx, &mut content).await;
        settle(&handle, result, content, &tx).await
    });
    RoundExecution {
        events: rx,
        outcome,
    }
}

/// Execute one side turn with tool-calling support: a non-streaming probe
/// decides whether to search; any searches run (degrading to a textual
/// failure digest), then a fresh streaming call carries the findings.
pub fn execute_round_with_tools(
    handle: ClientHandle,
    side: Position,
    phase: DebatePhase,
    topic: String,
    transcript: Vec<TranscriptEntry>,
    search: Arc<dyn SearchProvider>,
) -> RoundExecution {
    let (tx, rx) = mpsc::channel(ROUND_CHANNEL_CAPACITY);
    let outcome = tokio::spawn(async move {
        let mut content = String::new();
        let result = run_with_tools(
            &handle,
            side,
            phase,
            &topic,
            &transcript,
            search.as_ref(),
            &tx,
            &mut content,
        )
        .await;
        settle(&handle, result, content, &tx).await
    });
    RoundExecution {
        events: rx,
        outcome,
    }
}

/// Execute the judgement turn (streaming, never tooled - the judge rules
/// on the transcript alone).
pub fn execute_judge_round(
    handle: ClientHandle,
    topic: String,
    transcript: Vec<TranscriptEntry>,
) -> RoundExecution {
    let (tx, rx) = mpsc::channel(ROUND_CHANNEL_CAPACITY);
    let outcome = tokio::spawn(async move {
        let request = ChatRequest {
            messages: build_judge_prompt(&topic, &transcript),
            tools: Vec::new(),
            temperature: JUDGE_TEMPERATURE,
            max_tokens: JUDGE_MAX_TOKENS,
        };
        let mut content = String::new();
        let result = relay_stream(&handle.client, request, &tx, &mut content).await;
        settle(&handle, result, content, &tx).await
    });
    RoundExecution {
        events: rx,
        outcome,
    }
}

fn side_request(messages: Vec<Message>) -> ChatRequest {
    ChatRequest {
        messages,
        tools: Vec::new(),
        temperature: SIDE_TEMPERATURE,
        max_tokens: SIDE_MAX_TOKENS,
    }
}

/// Turn a drive result into the task's outcome, synthesizing an error
/// event for exceptions that were not already surfaced as typed errors.
async fn settle(
    handle: &ClientHandle,
    result: Result<bool>,
    content: String,
    tx: &mpsc::Sender<RoundEvent>,
) -> Option<String> {
    match result {
        Ok(true) => Some(content),
        Ok(false) => None,
        Err(e) => {
            error!(model = %handle.model_id, error = %e, "round failed");
            let _ = tx
                .send(RoundEvent::Error {
                    message: e.to_string(),
                })
                .await;
            None
        }
    }
}

/// Stream one completion, forwarding normalized events and folding delta
/// text into `content`. Returns `Ok(true)` when the stream completed,
/// `Ok(false)` when it ended on a typed error or the receiver went away.
async fn relay_stream(
    client: &Arc<dyn ChatClient>,
    request: ChatRequest,
    tx: &mpsc::Sender<RoundEvent>,
    content: &mut String,
) -> Result<bool> {
    let mut upstream = client.stream(request).await?;

    while let Some(event) = upstream.recv().await {
        match normalize(event) {
            Some(RoundEvent::Delta { text }) => {
                content.push_str(&text);
                if tx.send(RoundEvent::Delta { text }).await.is_err() {
                    return Ok(false);
                }
            }
            Some(event @ RoundEvent::Error { .. }) => {
                let _ = tx.send(event).await;
                return Ok(false);
            }
            Some(event) => {
                if tx.send(event).await.is_err() {
                    return Ok(false);
                }
            }
            None => {}
        }
    }

    Ok(true)
}

/// The tool-call sub-protocol: probe, search, then stream with findings.
#[allow(clippy::too_many_arguments)]
async fn run_with_tools(
    handle: &ClientHandle,
    side: Position,
    phase: DebatePhase,
    topic: &str,
    transcript: &[TranscriptEntry],
    search: &dyn SearchProvider,
    tx: &mpsc::Sender<RoundEvent>,
    content: &mut String,
) -> Result<bool> {
    // Probe: one non-streaming call carrying the tool definition.
    let messages = build_side_prompt_with_tools(side, phase, topic, transcript, None);
    let response = handle
        .client
        .execute(ChatRequest {
            messages,
            tools: vec![web_search_tool()],
            temperature: SIDE_TEMPERATURE,
            max_tokens: SIDE_MAX_TOKENS,
        })
        .await?;

    if response.tool_calls.is_empty() {
        // The model answered directly; its content is the whole round.
        if !response.content.is_empty() {
            content.push_str(&response.content);
            if tx
                .send(RoundEvent::Delta {
                    text: response.content,
                })
                .await
                .is_err()
            {
                return Ok(false);
            }
        }
        if let Some(usage) = response.usage
            && tx.send(RoundEvent::Usage { usage }).await.is_err()
        {
            return Ok(false);
        }
        return Ok(true);
    }

    info!(
        model = %handle.model_id,
        calls = response.tool_calls.len(),
        "model requested tool calls"
    );

    let mut results: Vec<SearchResult> = Vec::new();
    for call in &response.tool_calls {
        if call.name != "web_search" {
            continue;
        }
        let Some(query) = parse_query(&call.arguments) else {
            continue;
        };
        match search.search(&query).await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(query = %query, error = %e, "search failed");
                results.push(SearchResult {
                    query,
                    results: format!("Search failed: {e}"),
                });
            }
        }
    }

    for result in &results {
        if tx
            .send(RoundEvent::Search {
                query: result.query.clone(),
                results: result.results.clone(),
            })
            .await
            .is_err()
        {
            return Ok(false);
        }
    }

    // Resolved: stream the real turn with the findings injected.
    let context = results
        .iter()
        .map(|r| format!("### Search: {}\n{}", r.query, r.results))
        .collect::<Vec<_>>()
        .join("\n\n");
    let messages = build_side_prompt_with_tools(side, phase, topic, transcript, Some(&context));

    relay_stream(&handle.client, side_request(messages), tx, content).await
}

/// Pull the `query` argument out of a tool call's raw JSON arguments.
fn parse_query(arguments: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(arguments)
        .ok()?
        .get("query")?
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from)
}
