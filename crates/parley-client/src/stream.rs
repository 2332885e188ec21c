//! Incremental server-sent-events consumer.
//!
//! Chunks arrive with arbitrary boundaries. [`SseLineDecoder`] keeps the
//! unterminated tail of the previous chunk so a record split across chunks is
//! only parsed once it is complete. Lines are split on raw `\n` bytes, which
//! never occur inside a multi-byte UTF-8 sequence, so characters split across
//! chunks are reassembled too.
//!
//! The server sends whole-reply snapshots rather than deltas: every event's
//! text *replaces* what is displayed. A `partial` flag on the event is logged
//! but does not change that.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use parley_core::extract_text;
use serde_json::Value;

use crate::error::StreamError;

/// Prefix of an SSE data line.
const DATA_PREFIX: &str = "data: ";

/// Payload marking the end of the event stream.
const DONE_MARKER: &str = "[DONE]";

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// At least one event produced text; holds the last snapshot.
    CompletedWithText(String),
    /// The stream ended without any text.
    CompletedEmpty,
}

/// A parsed SSE data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseRecord {
    /// The `[DONE]` terminator.
    Done,
    /// A trimmed, non-empty payload.
    Data(String),
}

impl SseRecord {
    /// Parse one line. Returns `None` for non-data lines and empty payloads.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        match payload {
            "" => None,
            DONE_MARKER => Some(Self::Done),
            data => Some(Self::Data(data.to_string())),
        }
    }
}

/// Splits a chunked byte stream into complete lines.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the line
    /// terminator (`\n` or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(|line| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    /// Bytes of the current incomplete line.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Read an SSE body to the end, reporting reply text as it arrives.
///
/// `on_first_text` runs once with the first non-empty text, before the first
/// `on_update`. `on_update` receives the full current reply
/// after every event that yields text.
///
/// A `[DONE]` record stops processing of the rest of its chunk; reading
/// continues until the stream itself ends. Malformed records are logged and
/// skipped.
///
/// The stream is owned by this function and dropped on every return path,
/// which releases the underlying connection.
///
/// # Errors
///
/// Returns `StreamError::Read` if the byte stream yields an error.
pub async fn consume_stream<S, B, E, F, U>(
    mut stream: S,
    on_first_text: F,
    mut on_update: U,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    F: FnOnce(&str),
    U: FnMut(&str),
{
    let mut decoder = SseLineDecoder::new();
    let mut on_first_text = Some(on_first_text);
    let mut current = String::new();
    let mut events = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StreamError::Read(e.to_string()))?;

        for line in decoder.push(chunk.as_ref()) {
            let payload = match SseRecord::parse(&line) {
                None => continue,
                Some(SseRecord::Done) => {
                    tracing::debug!(events, "Stream signalled completion");
                    break;
                }
                Some(SseRecord::Data(payload)) => payload,
            };

            let event: Value = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, payload = %payload, "Skipping malformed SSE record");
                    continue;
                }
            };
            events += 1;

            let partial = event.get("partial").and_then(Value::as_bool);
            let text = extract_text(&event);
            tracing::trace!(?partial, len = text.len(), "SSE event");

            if text.is_empty() {
                continue;
            }
            if let Some(first) = on_first_text.take() {
                tracing::debug!("First streamed text received");
                first(&text);
            }
            current = text;
            on_update(&current);
        }
    }

    if !decoder.pending().is_empty() {
        tracing::debug!(bytes = decoder.pending().len(), "Discarding unterminated trailing line");
    }

    if current.is_empty() {
        tracing::debug!(events, "Stream ended without text");
        Ok(StreamOutcome::CompletedEmpty)
    } else {
        tracing::debug!(events, len = current.len(), "Stream ended");
        Ok(StreamOutcome::CompletedWithText(current))
    }
}
