//! Incremental decoder for the chat response stream
//!
//! The transport may cut the body anywhere, including inside a record or a
//! multi-byte character. The decoder keeps the unterminated tail of the
//! previous chunk and only decodes complete lines, so the events produced do
//! not depend on how the body was fragmented.

use crate::events::{StreamEvent, WireRecord};
use crmai_common::{EVENT_PREFIX, truncate_for_log};
use tracing::debug;

/// Counters kept while decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete lines seen
    pub lines: u64,
    /// Events produced
    pub events: u64,
    /// Event lines dropped because the record did not decode
    pub malformed: u64,
    /// Lines without the event prefix, or records of unknown type
    pub ignored: u64,
}

/// Line-buffering decoder for `data: {...}` event lines
#[derive(Debug, Default)]
pub struct StreamDecoder {
    carry: Vec<u8>,
    accumulated: String,
    terminated: bool,
    finished: bool,
    stats: DecoderStats,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next piece of the body; returns the events it completed, in order.
    ///
    /// Input after an End or Error record is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished || self.terminated {
            return events;
        }

        self.carry.extend_from_slice(chunk);
        let Some(last_newline) = self.carry.iter().rposition(|&b| b == b'\n') else {
            return events;
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);
        for line in complete[..last_newline].split(|&b| b == b'\n') {
            self.decode_line(line, &mut events);
            if self.terminated {
                // nothing after End or Error belongs to this reply
                self.carry.clear();
                break;
            }
        }
        events
    }

    /// Convenience wrapper over [`feed`](Self::feed) for text input
    pub fn feed_str(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.feed(chunk.as_bytes())
    }

    /// Signal transport closure.
    ///
    /// Decodes an unterminated final line, then closes the stream with an
    /// implicit [`StreamEvent::End`] unless End or Error was already seen.
    /// The accumulated text is kept.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.finished = true;

        let tail = std::mem::take(&mut self.carry);
        if !tail.is_empty() && !self.terminated {
            self.decode_line(&tail, &mut events);
        }
        if !self.terminated {
            debug!("Stream closed without end record, finishing implicitly");
            self.terminated = true;
            self.stats.events += 1;
            events.push(StreamEvent::End);
        }
        events
    }

    /// Concatenation of all chunk contents decoded so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// True once End or Error has been decoded or the stream was finished
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        self.stats.lines += 1;
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                self.stats.malformed += 1;
                debug!("Dropping non UTF-8 stream line: {}", e);
                return;
            }
        };

        let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
            if !line.is_empty() {
                self.stats.ignored += 1;
            }
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        let record: WireRecord = match serde_json::from_str(payload) {
            Ok(record) => record,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(
                    "Dropping malformed stream record '{}': {}",
                    truncate_for_log(payload, 80),
                    e
                );
                return;
            }
        };

        let Some(event) = record.into_event() else {
            self.stats.ignored += 1;
            debug!("Ignoring stream record of unknown type");
            return;
        };

        match &event {
            StreamEvent::Chunk(content) => self.accumulated.push_str(content),
            StreamEvent::End | StreamEvent::Error(_) => self.terminated = true,
            StreamEvent::Start(_) => {}
        }
        self.stats.events += 1;
        events.push(event);
    }
}
