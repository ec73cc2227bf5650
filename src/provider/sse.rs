//! SSE frame decoding for streaming chat responses
//!
//! Chat Completions streams arrive as `data: <json>` lines terminated by
//! a `data: [DONE]` sentinel. The decoder buffers partial network chunks
//! and hands back complete data payloads; the buffer is bounded so a
//! malformed stream cannot grow it without limit.

/// Sentinel payload that marks the end of a Chat Completions stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Buffer cap: half a megabyte of pending bytes is already far past any
/// legitimate single frame.
const MAX_BUFFER_BYTES: usize = 512 * 1024;

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns the data payloads of every complete
    /// frame it finished, without the `data: ` prefix. Non-data lines
    /// (comments, `event:`, blanks) are skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        if self.buffer.len() > MAX_BUFFER_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "sse buffer over limit, dropping oldest half"
            );
            let keep_from = self.buffer.len() - MAX_BUFFER_BYTES / 2;
            // Resync on the next line boundary so we never emit a frame
            // that starts mid-payload.
            let resync = self.buffer[keep_from..]
                .find('\n')
                .map(|i| keep_from + i + 1)
                .unwrap_or(self.buffer.len());
            self.buffer.drain(..resync);
        }

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }

    /// Whether an incomplete line is still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}
