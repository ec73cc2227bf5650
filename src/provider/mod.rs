//! Provider abstraction for upstream chat models
//!
//! Every debate role talks to its model through the [`ChatClient`] trait:
//! a one-shot `execute` (used by the tool-call probe) and a streaming
//! `stream` that yields [`UpstreamEvent`]s over an mpsc channel. The one
//! concrete implementation speaks the OpenAI-compatible Chat Completions
//! protocol, which covers every provider in the registry.

mod chat_api;
pub mod registry;
pub mod sse;

pub use chat_api::ChatApiClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single prompt message.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A tool the model may invoke during a one-shot call.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model. Arguments arrive as the raw
/// JSON string the API produced; callers parse what they need.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// Token accounting reported by the upstream API.
#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a non-streaming chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

/// Streaming primitives emitted by a provider. This is a closed union:
/// anything the upstream sends that does not map onto one of these four
/// shapes is dropped (with a debug log) at the decode layer.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Incremental answer text. May be empty; normalization drops those.
    ContentDelta(String),
    /// Incremental reasoning text (models that expose it).
    ThinkingDelta(String),
    /// Token usage metadata, typically on the final frame.
    Metadata(Usage),
    /// Error surfaced mid-stream; terminates the stream.
    StreamError(String),
}

/// Parameters for one chat call. The client is already bound to a model,
/// so no model id travels with the request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Unified client trait for upstream chat backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One-shot completion; used for the tool-call probe.
    async fn execute(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streaming completion. The receiver yields events until the stream
    /// ends (channel close) or a `StreamError` is emitted.
    async fn stream(&self, request: ChatRequest) -> Result<mpsc::Receiver<UpstreamEvent>>;
}

/// Binds a debate role to a resolved model and its chat capability.
/// Immutable once resolved for a debate invocation.
#[derive(Clone)]
pub struct ClientHandle {
    /// Provider id, e.g. "deepseek".
    pub provider: String,
    /// Full model id, e.g. "deepseek/deepseek-chat".
    pub model_id: String,
    pub client: Arc<dyn ChatClient>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}
