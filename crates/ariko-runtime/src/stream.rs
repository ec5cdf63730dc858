//! Incremental stream decoding
//!
//! Network chunks split records at arbitrary byte offsets. The decoder keeps
//! the incomplete tail between calls, removes the provider's framing and
//! hands only complete record payloads to the provider strategy.

use crate::providers::{Provider, ProviderStrategy, StreamFormat};

/// Buffered bytes allowed without a line break before the buffer is dropped
pub const MAX_BUFFER_BYTES: usize = 1024 * 1024;

const DONE_MARKER: &str = "[DONE]";

/// Stateful line decoder for one streamed response
pub struct StreamDecoder {
    provider: Provider,
    buffer: Vec<u8>,
}

impl StreamDecoder {
    pub const fn new(provider: Provider) -> Self {
        Self {
            provider,
            buffer: Vec::new(),
        }
    }

    /// Feed raw bytes; returns the text increments of every record they
    /// complete
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(delta) = self.decode_line(&line) {
                deltas.push(delta);
            }
        }

        if self.buffer.len() > MAX_BUFFER_BYTES {
            tracing::warn!(
                provider = %self.provider.kind(),
                bytes = self.buffer.len(),
                "Stream buffer exceeded limit without a record boundary, discarding"
            );
            self.buffer.clear();
        }

        deltas
    }

    /// Decode whatever remains once the transfer has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest)
    }

    fn decode_line(&self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        let record = match self.provider.stream_format() {
            // Comments, `event:` and `id:` lines carry no text
            StreamFormat::Sse => sse_data(line)?,
            StreamFormat::Ndjson => line,
        };
        if record.is_empty() || record == DONE_MARKER {
            return None;
        }
        self.provider.parse_stream_record(record)
    }
}

/// Payload of an SSE `data:` line; `None` for other lines
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
