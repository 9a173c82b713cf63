//! Event stream frame decoder
//!
//! The stream body is a sequence of JSON objects with no framing. Bytes are
//! accumulated until the whole buffer parses as one document; that document's
//! `Events` are released and the buffer starts over.

use tracing::trace;

use crate::error::{NomadClientError, Result};

/// Accumulates stream chunks until they form a complete frame
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes received since the last complete frame
    buffer: Vec<u8>,
    /// Maximum number of buffered bytes (unlimited when `None`)
    limit: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Feed one chunk and return the events of a frame it completed
    ///
    /// An incomplete frame yields no events and keeps the bytes. Heartbeat
    /// frames (`{}`) complete without events. Exceeding the limit discards
    /// the buffer and reports [`NomadClientError::BufferOverflow`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<serde_json::Value>> {
        self.buffer.extend_from_slice(chunk);

        let frame = match serde_json::from_slice::<serde_json::Value>(&self.buffer) {
            Ok(frame) => frame,
            Err(_) => {
                if let Some(limit) = self.limit {
                    if self.buffer.len() > limit {
                        let len = self.buffer.len();
                        self.reset();
                        return Err(NomadClientError::BufferOverflow { len, limit });
                    }
                }
                trace!("Frame incomplete ({} bytes buffered)", self.buffer.len());
                return Ok(Vec::new());
            }
        };

        self.buffer.clear();

        match frame {
            serde_json::Value::Object(mut fields) => match fields.remove("Events") {
                Some(serde_json::Value::Array(events)) => Ok(events),
                _ => {
                    trace!("Heartbeat frame");
                    Ok(Vec::new())
                }
            },
            _ => Ok(Vec::new()),
        }
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_frame_in_one_chunk() {
        let mut decoder = FrameDecoder::new();

        let events = decoder
            .feed(br#"{"Index":3,"Events":[{"Topic":"Job","Index":3},{"Topic":"Job","Index":3}]}"#)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["Topic"], "Job");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_truncated_frame_completes_once() {
        let mut decoder = FrameDecoder::new();

        let first = decoder.feed(br#"{"Events":[{"A":1}"#).unwrap();
        assert!(first.is_empty());
        assert_eq!(decoder.buffered_len(), 18);

        let second = decoder.feed(b"]}").unwrap();
        assert_eq!(second, vec![json!({"A": 1})]);
        assert!(decoder.is_empty());

        // Nothing left to release
        assert!(decoder.feed(b"").unwrap().is_empty());
    }

    #[test]
    fn test_two_frames_across_three_chunks() {
        let mut decoder = FrameDecoder::new();
        let mut released = Vec::new();

        for chunk in [
            &br#"{"Events":[{"N":1},"#[..],
            &br#"{"N":2}]}"#[..],
            &br#"{"Events":[{"N":3}]}"#[..],
        ] {
            released.extend(decoder.feed(chunk).unwrap());
        }

        assert_eq!(
            released,
            vec![json!({"N": 1}), json!({"N": 2}), json!({"N": 3})]
        );
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_heartbeat_clears_buffer() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"{}\n").unwrap().is_empty());
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let frame = r#"{"Events":[{"Key":"café"}]}"#.as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(decoder.feed(&frame[..split]).unwrap().is_empty());
        let events = decoder.feed(&frame[split..]).unwrap();
        assert_eq!(events, vec![json!({"Key": "café"})]);
    }

    #[test]
    fn test_without_limit_garbage_accumulates() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"{\"Events\":[").unwrap();
        decoder.feed(b"}}}}").unwrap();
        assert!(!decoder.is_empty());
        // A later valid frame cannot recover a poisoned buffer
        assert!(decoder.feed(br#"{"Events":[{"A":1}]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_limit_discards_buffer() {
        let mut decoder = FrameDecoder::with_limit(Some(16));
        assert!(decoder.feed(b"{\"Events\":[").unwrap().is_empty());

        match decoder.feed(b"{\"Key\":\"long-value\"") {
            Err(NomadClientError::BufferOverflow { len, limit }) => {
                assert_eq!(limit, 16);
                assert!(len > 16);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(decoder.is_empty());

        let events = decoder.feed(br#"{"Events":[]}"#).unwrap();
        assert!(events.is_empty());
        assert!(decoder.is_empty());
    }
}
