//! Debate event pipeline types
//!
//! Two layers. [`RoundEvent`] is the normalized internal shape produced
//! while one turn runs; [`DebateEvent`] is the transport-facing shape the
//! orchestrator emits after tagging each round event with side, phase,
//! and model so the client can attribute it statelessly.

use serde::Serialize;

use super::{DebatePhase, Position, phase_value, position_value};
use crate::provider::{UpstreamEvent, Usage};

/// Normalized event inside one round.
#[derive(Debug, Clone)]
pub enum RoundEvent {
    Delta { text: String },
    Thinking { text: String },
    Usage { usage: Usage },
    Search { query: String, results: String },
    Error { message: String },
}

/// Map one upstream primitive to at most one round event.
///
/// Classification order: content delta, thinking delta, usage metadata,
/// stream error - first match wins, the variants are mutually exclusive.
/// Payload-free events (empty deltas) are dropped. This function never
/// fails; frames that could not be decoded at all were already dropped
/// (and logged) in the provider layer.
pub fn normalize(event: UpstreamEvent) -> Option<RoundEvent> {
    match event {
        UpstreamEvent::ContentDelta(text) => {
            if text.is_empty() {
                None
            } else {
                Some(RoundEvent::Delta { text })
            }
        }
        UpstreamEvent::ThinkingDelta(text) => {
            if text.is_empty() {
                None
            } else {
                Some(RoundEvent::Thinking { text })
            }
        }
        UpstreamEvent::Metadata(usage) => Some(RoundEvent::Usage { usage }),
        UpstreamEvent::StreamError(message) => Some(RoundEvent::Error { message }),
    }
}

/// Model ids announced in the init event.
#[derive(Debug, Clone, Serialize)]
pub struct DebateModels {
    pub pro: String,
    pub con: String,
    pub judge: String,
}

/// Events sent to the client, one JSON object per SSE frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DebateEvent {
    /// Debate accepted; announces the resolved models.
    #[serde(rename = "phase")]
    Init {
        phase: String,
        message: String,
        models: DebateModels,
    },

    #[serde(rename = "phase_start")]
    PhaseStart {
        phase: String,
        side: String,
        title: String,
        provider: String,
        model: String,
    },

    #[serde(rename = "delta")]
    Delta {
        side: String,
        phase: String,
        model: String,
        content: String,
    },

    #[serde(rename = "thinking")]
    Thinking {
        side: String,
        phase: String,
        model: String,
        content: String,
    },

    #[serde(rename = "usage")]
    Usage {
        side: String,
        phase: String,
        model: String,
        usage: Usage,
    },

    #[serde(rename = "search")]
    Search {
        side: String,
        phase: String,
        model: String,
        query: String,
        results: String,
    },

    #[serde(rename = "phase_done")]
    PhaseDone {
        phase: String,
        side: String,
        model: String,
    },

    /// Terminates the stream in place of further progress.
    #[serde(rename = "error")]
    Error { message: String },

    /// Terminal event of a fully completed debate.
    #[serde(rename = "done")]
    Done,
}

impl DebateEvent {
    /// Tag a round event with its side, phase, and model. Errors carry no
    /// tags on the wire.
    pub fn tagged(side: Position, phase: DebatePhase, model: &str, event: RoundEvent) -> Self {
        let side_value = position_value(side).to_string();
        let phase_wire = phase_value(phase).to_string();
        match event {
            RoundEvent::Delta { text } => DebateEvent::Delta {
                side: side_value,
                phase: phase_wire,
                model: model.to_string(),
                content: text,
            },
            RoundEvent::Thinking { text } => DebateEvent::Thinking {
                side: side_value,
                phase: phase_wire,
                model: model.to_string(),
                content: text,
            },
            RoundEvent::Usage { usage } => DebateEvent::Usage {
                side: side_value,
                phase: phase_wire,
                model: model.to_string(),
                usage,
            },
            RoundEvent::Search { query, results } => DebateEvent::Search {
                side: side_value,
                phase: phase_wire,
                model: model.to_string(),
                query,
                results,
            },
            RoundEvent::Error { message } => DebateEvent::Error { message },
        }
    }
}
