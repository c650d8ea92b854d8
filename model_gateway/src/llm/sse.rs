//! SSE decoding for Anthropic streaming responses
//!
//! Splits the upstream byte stream into frames and decodes each frame's
//! `data:` payload into a [`MessageStreamEvent`]. Decoding happens once, here;
//! everything downstream works with typed events.

use std::{collections::VecDeque, fmt::Display};

use bytes::Bytes;
use fantasy_protocol::messages::MessageStreamEvent;
use futures::{Stream, StreamExt};
use tracing::debug;

use super::{LlmError, ModelEventStream};

// ============================================================================
// Constants
// ============================================================================

/// Maximum SSE buffer size (1 MB) to protect against an upstream that sends
/// data without frame delimiters.
const MAX_SSE_BUFFER_SIZE: usize = 1024 * 1024;

// ============================================================================
// Frame decoder
// ============================================================================

/// Incremental frame decoder.
///
/// Bytes are buffered until a blank line (`\n\n`) closes a frame, so
/// multi-byte UTF-8 sequences split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<MessageStreamEvent>, LlmError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(frame_end) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..frame_end + 2).collect();
            if let Some(event) = decode_frame(&frame[..frame.len() - 2])? {
                events.push(event);
            }
        }

        if self.buffer.len() > MAX_SSE_BUFFER_SIZE {
            return Err(LlmError::Stream(format!(
                "SSE buffer exceeded maximum size ({} bytes)",
                MAX_SSE_BUFFER_SIZE
            )));
        }

        Ok(events)
    }

    /// Flush whatever is left once the upstream closes.
    pub fn finish(&mut self) -> Result<Option<MessageStreamEvent>, LlmError> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        decode_frame(&rest)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn decode_frame(frame: &[u8]) -> Result<Option<MessageStreamEvent>, LlmError> {
    let frame = std::str::from_utf8(frame)
        .map_err(|e| LlmError::Stream(format!("invalid UTF-8 in SSE frame: {}", e)))?;

    let Some((event_type, data)) = parse_sse_frame(frame) else {
        return Ok(None);
    };

    serde_json::from_str::<MessageStreamEvent>(&data)
        .map(Some)
        .map_err(|e| LlmError::Stream(format!("malformed '{}' event: {}", event_type, e)))
}

/// Parse a raw SSE frame into `(event_type, data)`.
///
/// SSE frames look like:
/// ```text
/// event: content_block_start
/// data: {"type":"content_block_start",...}
/// ```
fn parse_sse_frame(frame: &str) -> Option<(String, String)> {
    let mut event_type = String::new();
    let mut data_lines = Vec::new();

    for line in frame.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event_type = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim().to_string());
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    if event_type.is_empty() {
        event_type = "message".to_string();
    }

    Some((event_type, data))
}

// ============================================================================
// Stream adapter
// ============================================================================

/// Turn an upstream byte stream into a stream of decoded events.
///
/// The first decode or transport error is yielded and ends the stream.
pub fn decode_event_stream<S, E>(bytes: S) -> ModelEventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        inner: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<MessageStreamEvent>,
        done: bool,
    }

    let state = State {
        inner: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => match state.decoder.feed(&chunk) {
                    Ok(events) => state.pending.extend(events),
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                },
                Some(Err(e)) => {
                    state.done = true;
                    return Some((
                        Err(LlmError::Stream(format!("stream read error: {}", e))),
                        state,
                    ));
                }
                None => {
                    state.done = true;
                    debug!("Upstream SSE stream closed");
                    match state.decoder.finish() {
                        Ok(Some(event)) => state.pending.push_back(event),
                        Ok(None) => {}
                        Err(e) => return Some((Err(e), state)),
                    }
                }
            }
        }
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use fantasy_protocol::messages::ContentBlockDelta;

    use super::*;

    #[test]
    fn test_parse_sse_frame_basic() {
        let frame = "event: message_start\ndata: {\"type\":\"message_start\"}";
        let (event_type, data) = parse_sse_frame(frame).unwrap();
        assert_eq!(event_type, "message_start");
        assert_eq!(data, "{\"type\":\"message_start\"}");
    }

    #[test]
    fn test_parse_sse_frame_empty() {
        assert!(parse_sse_frame("").is_none());
        assert!(parse_sse_frame("event: foo").is_none());
        assert!(parse_sse_frame(": keep-alive comment").is_none());
    }

    #[test]
    fn test_parse_sse_frame_with_extra_whitespace() {
        let frame = "  event: content_block_delta  \n  data: {\"type\":\"ping\"}  ";
        let (event_type, data) = parse_sse_frame(frame).unwrap();
        assert_eq!(event_type, "content_block_delta");
        assert_eq!(data, "{\"type\":\"ping\"}");
    }

    #[test]
    fn test_decoder_handles_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let first = decoder
            .feed(b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,")
            .unwrap();
        assert!(first.is_empty());

        let second = decoder
            .feed(b"\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\nevent: ping\ndata: {\"type\":\"ping\"}\n\n")
            .unwrap();
        assert_eq!(second.len(), 2);
        match &second[0] {
            MessageStreamEvent::ContentBlockDelta { index, delta } => {
                assert_eq!(*index, 0);
                assert_eq!(
                    delta,
                    &ContentBlockDelta::TextDelta {
                        text: "hi".to_string()
                    }
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(second[1], MessageStreamEvent::Ping));
    }

    #[test]
    fn test_decoder_handles_utf8_split_across_chunks() {
        let payload =
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"caf\u{e9}\"}}\n\n";
        let bytes = payload.as_bytes();
        let split = payload.find('\u{e9}').unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&bytes[..split]).unwrap().is_empty());
        let events = decoder.feed(&bytes[split..]).unwrap();
        match &events[0] {
            MessageStreamEvent::ContentBlockDelta {
                delta: ContentBlockDelta::TextDelta { text },
                ..
            } => assert_eq!(text, "caf\u{e9}"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decoder_rejects_malformed_json() {
        let mut decoder = SseDecoder::new();
        let err = decoder
            .feed(b"event: content_block_delta\ndata: {not json}\n\n")
            .unwrap_err();
        assert!(matches!(err, LlmError::Stream(msg) if msg.contains("content_block_delta")));
    }

    #[test]
    fn test_decoder_unknown_event_type_is_not_an_error() {
        let mut decoder = SseDecoder::new();
        let events = decoder
            .feed(b"event: future_event\ndata: {\"type\":\"future_event\",\"x\":1}\n\n")
            .unwrap();
        assert!(matches!(events[0], MessageStreamEvent::Unknown));
    }

    #[test]
    fn test_decoder_flushes_trailing_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .feed(b"data: {\"type\":\"message_stop\"}")
            .unwrap()
            .is_empty());
        assert!(matches!(
            decoder.finish().unwrap(),
            Some(MessageStreamEvent::MessageStop)
        ));
        assert!(decoder.finish().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_decode_event_stream_yields_events_then_error() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"ping\"}\n\n")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b"data: {\"type\":\"message_stop\"}\n\n")),
        ];
        let mut stream = decode_event_stream(futures::stream::iter(chunks));

        assert!(matches!(
            stream.next().await,
            Some(Ok(MessageStreamEvent::Ping))
        ));
        assert!(matches!(
            stream.next().await,
            Some(Err(LlmError::Stream(msg))) if msg.contains("connection reset")
        ));
        assert!(stream.next().await.is_none());
    }
}
