//! Transcript compression
//!
//! Before each side prompt is built, the accumulated transcript is trimmed
//! to a per-role token budget so prompt size stays bounded no matter how
//! long the debate history grows. Newest context always wins: we walk the
//! transcript from the most recent entry backwards and keep whole entries
//! until the budget runs out.
//!
//! Token costs are estimated, not tokenizer-exact: roughly four characters
//! per token, floored at one token per entry.

use super::{Position, TranscriptEntry};

/// Estimated characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Marker appended when a single oversized entry had to be cut down.
const TRUNCATION_MARKER: &str = "\n\n[... truncated for length]";

/// Total prompt-token budget for a role's history.
pub fn max_tokens_for(role: Position) -> usize {
    match role {
        Position::Pro | Position::Con => 4096,
        Position::Judge => 8192,
    }
}

/// Tokens held back from the budget for instructions and output headroom.
pub fn reserved_tokens_for(role: Position) -> usize {
    match role {
        Position::Pro | Position::Con => 1024,
        Position::Judge => 2048,
    }
}

/// Estimate the token cost of a piece of text.
pub fn estimate_tokens(text: &str) -> usize {
    std::cmp::max(1, text.chars().count().div_ceil(CHARS_PER_TOKEN))
}

/// Result of compressing a transcript for one role.
#[derive(Debug, Clone)]
pub struct CompressedTranscript {
    /// Chronologically ordered suffix of the input (or one synthetic
    /// truncated entry when even the newest entry overflows alone).
    pub entries: Vec<TranscriptEntry>,
    /// Whether anything was dropped or cut relative to the full input.
    pub dropped: bool,
}

/// Compress `transcript` to fit the history budget for `role`.
///
/// Keeps the newest entries whose combined estimated cost stays within
/// `max_tokens_for(role) - reserved_tokens_for(role)`, restoring
/// chronological order before returning. If even the single newest entry
/// exceeds the budget, its content is truncated to the budget (in
/// characters) and a truncation marker is appended.
pub fn compress_for_role(transcript: &[TranscriptEntry], role: Position) -> CompressedTranscript {
    if transcript.is_empty() {
        return CompressedTranscript {
            entries: Vec::new(),
            dropped: false,
        };
    }

    let allowed = max_tokens_for(role).saturating_sub(reserved_tokens_for(role));

    let mut kept: Vec<TranscriptEntry> = Vec::new();
    let mut used = 0usize;

    for entry in transcript.iter().rev() {
        let cost = estimate_tokens(&entry.content);
        if used + cost > allowed && !kept.is_empty() {
            break;
        }
        if used + cost > allowed {
            // Even the newest entry alone overflows: cut it down to budget.
            let keep_chars = allowed * CHARS_PER_TOKEN;
            let mut content: String = entry.content.chars().take(keep_chars).collect();
            content.push_str(TRUNCATION_MARKER);
            kept.push(TranscriptEntry {
                content,
                ..entry.clone()
            });
            break;
        }
        used += cost;
        kept.push(entry.clone());
    }

    let dropped = kept.len() < transcript.len()
        || kept
            .last()
            .is_some_and(|e| e.content.ends_with(TRUNCATION_MARKER));

    kept.reverse();
    CompressedTranscript {
        entries: kept,
        dropped,
    }
}
