//! Incremental decoding of the provider's event stream
//!
//! The decoder is handed the whole response received so far and remembers how
//! many bytes it has already consumed. Only complete lines are consumed, so a
//! line split across network reads is decoded once, after its newline arrives.

use crate::llm::RelayError;
use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Provider events the relay acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    TextDelta(String),
    MessageStop,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SsePayload {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    text: Option<String>,
}

/// Tracks how much of a growing response buffer has been decoded
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SseDecoder {
    /// Offset into the current buffer
    processed: usize,
    /// Bytes already dropped from the front of the buffer
    discarded: usize,
}

impl SseDecoder {
    /// Bytes of the stream consumed so far, including compacted ones
    pub fn processed(&self) -> usize {
        self.discarded + self.processed
    }

    /// Drop the consumed prefix from `buffer`, keeping only the partial tail.
    pub fn compact(&mut self, buffer: &mut Vec<u8>) {
        let consumed = self.processed.min(buffer.len());
        buffer.drain(..consumed);
        self.discarded += consumed;
        self.processed -= consumed;
    }

    /// Decode every complete line not yet seen.
    pub fn feed(&mut self, buffer: &[u8]) -> Vec<UpstreamEvent> {
        let Some(unseen) = buffer.get(self.processed..) else {
            return Vec::new();
        };
        let Some(last_newline) = unseen.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let (complete, _) = unseen.split_at(last_newline + 1);
        self.processed += complete.len();
        decode_lines(complete)
    }

    /// Decode everything not yet seen, including an unterminated final line.
    pub fn finish(&mut self, buffer: &[u8]) -> Vec<UpstreamEvent> {
        let Some(unseen) = buffer.get(self.processed..) else {
            return Vec::new();
        };
        self.processed = buffer.len();
        decode_lines(unseen)
    }
}

fn decode_lines(bytes: &[u8]) -> Vec<UpstreamEvent> {
    bytes
        .split(|&b| b == b'\n')
        .filter_map(|line| {
            let line = String::from_utf8_lossy(line);
            match decode_line(&line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed stream line");
                    None
                }
            }
        })
        .collect()
}

/// Decode one line of the stream.
///
/// Lines that are not `data:` lines, the `[DONE]` sentinel and events the
/// relay does not act on yield `Ok(None)`.
pub fn decode_line(line: &str) -> Result<Option<UpstreamEvent>, RelayError> {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(None);
    }

    let parsed: SsePayload = serde_json::from_str(payload)
        .map_err(|e| RelayError::malformed_payload(format!("bad event payload: {e}")))?;

    Ok(match parsed {
        SsePayload::ContentBlockDelta { delta } => delta
            .text
            .filter(|text| !text.is_empty())
            .map(UpstreamEvent::TextDelta),
        SsePayload::MessageStop => Some(UpstreamEvent::MessageStop),
        SsePayload::Other => None,
    })
}
