//! Incremental decoding of `text/event-stream` bodies.
//!
//! Upstreams frame each record as a `data: <json>` line. Transport chunks can
//! end anywhere, including inside a multi-byte UTF-8 sequence, so lines are cut
//! on `\n` at the byte level and only complete lines are decoded.

/// Marker some upstreams send as the last record.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// Splits a byte stream into lines, buffering the trailing partial line.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transport chunk and returns every line it completed, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Returns the buffered partial line once the transport has ended, if it holds anything.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

/// Returns the trimmed payload of a `data: ` line.
///
/// Other lines (comments, `event:` fields, blank separators) and the `[DONE]`
/// sentinel yield `None`.
pub fn data_payload(line: &str) -> Option<&str> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == DONE_SENTINEL {
        None
    } else {
        Some(payload)
    }
}
