//! Server-sent events from a streamed chat completion
//!
//! Each event is a `data:` line holding one JSON delta; the stream ends with
//! `data: [DONE]`. Other SSE fields (`event:`, `id:`, comments) are ignored.

use super::{ChatError, TextStream};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;

/// End-of-stream sentinel
const DONE: &str = "[DONE]";

/// One parsed SSE event of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Splits a byte stream into SSE lines, carrying partial lines over
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    /// Feed bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Events from a final line lacking its newline
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line: Vec<u8> = self.buf.drain(..).collect();
        let line = String::from_utf8_lossy(&line);
        parse_line(line.trim_end_matches('\r'))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == DONE {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

/// Text carried by one `data:` payload, if any
pub fn parse_data_line(data: &str) -> Result<Option<String>, ChatError> {
    let payload: ChunkPayload = serde_json::from_str(data)?;
    if let Some(error) = payload.error {
        return Err(ChatError::Connection(error.message));
    }
    Ok(payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

struct SseState<S> {
    bytes: S,
    lines: SseLineBuffer,
    ready: VecDeque<Result<String, ChatError>>,
    done: bool,
}

impl<S> SseState<S> {
    fn queue(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            if self.done {
                return;
            }
            match event {
                SseEvent::Done => self.done = true,
                SseEvent::Data(data) => match parse_data_line(&data) {
                    Ok(Some(text)) => self.ready.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => {
                        self.ready.push_back(Err(e));
                        self.done = true;
                    }
                },
            }
        }
    }
}

/// Turn a response body into a stream of text fragments
pub(crate) fn text_stream<S>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        lines: SseLineBuffer::default(),
        ready: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.lines.push(&chunk);
                    state.queue(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ChatError::from(e)), state));
                }
                None => {
                    let tail = state.lines.finish();
                    state.queue(tail);
                    state.done = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(text).unwrap()
        )
    }

    #[test]
    fn test_lines_split_across_pushes() {
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(
            lines.push(b":1}\r\n\r\ndata: [DONE]\n"),
            vec![SseEvent::Data("{\"a\":1}".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn test_ignores_other_fields() {
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(b": keep-alive\nevent: x\nid: 3\n\n").is_empty());
    }

    #[test]
    fn test_parse_data_line() {
        let line = delta("Bonjour");
        let data = line.trim().strip_prefix("data: ").unwrap();
        assert_eq!(parse_data_line(data).unwrap().as_deref(), Some("Bonjour"));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_data_line(role_only).unwrap(), None);

        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_data_line(finish).unwrap(), None);

        assert!(parse_data_line("not json").is_err());
        assert!(parse_data_line(r#"{"error":{"message":"overloaded"}}"#).is_err());
    }

    #[tokio::test]
    async fn test_text_stream_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", delta("Bon"), delta("jour é"), delta("ignored"));
        let bytes = body.into_bytes();
        let chunks: Vec<Result<Bytes, reqwest::Error>> = bytes
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let fragments: Vec<String> = text_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments.concat(), "Bonjour é");
    }

    #[tokio::test]
    async fn test_text_stream_without_done_marker() {
        let body = delta("fin");
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from(body))];
        let fragments: Vec<String> = text_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["fin"]);
    }
}
