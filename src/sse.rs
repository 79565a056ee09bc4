//! SSE (Server-Sent Events) parser for the chat-completions stream.
//!
//! The completion endpoint streams each chunk as a single `data: <json>`
//! line, terminated by a literal `data: [DONE]` sentinel. Blank lines
//! separate events and lines starting with `:` are comments; neither
//! carries payload, so every complete event maps to exactly one data line.

use crate::models::ChatStreamChunk;

/// Sentinel payload marking the end of a completion stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Represents a classified SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Data payload (e.g., `data: {"choices": ...}`)
    Data(String),
    /// Empty line - separates events
    Empty,
    /// Comment line (starts with ':'), used for keepalive
    Comment(String),
    /// Any other field line (e.g., `event:`, `id:`); ignored by this stream
    Field(String),
}

impl SseLine {
    /// Classify a raw line from the stream (without trailing newline).
    pub fn classify(line: &str) -> Self {
        if line.is_empty() {
            SseLine::Empty
        } else if let Some(comment) = line.strip_prefix(':') {
            SseLine::Comment(comment.trim_start().to_string())
        } else if let Some(data) = line.strip_prefix("data:") {
            SseLine::Data(data.trim_start().to_string())
        } else {
            SseLine::Field(line.to_string())
        }
    }
}

/// Typed events decoded from the completion stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A piece of streamed answer text
    Delta { text: String },
    /// Stream completed (`data: [DONE]`)
    Done,
}

/// SSE parse errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SseParseError {
    /// Data payload was not valid JSON
    #[error("invalid JSON in stream data: {message}")]
    InvalidJson { message: String },
}

/// Parser for the chat-completions SSE stream.
///
/// Feed one line at a time with [`feed_line`](SseParser::feed_line).
/// Data lines decode directly to events; role-only and empty deltas are
/// consumed without producing one.
#[derive(Debug, Default)]
pub struct SseParser {
    done: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a line from the stream, potentially returning a decoded event.
    ///
    /// Returns `Ok(None)` for comments, blank separators, non-data fields,
    /// chunks without a text delta, and anything after `[DONE]`.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<SseEvent>, SseParseError> {
        if self.done {
            return Ok(None);
        }
        match SseLine::classify(line) {
            SseLine::Empty | SseLine::Comment(_) | SseLine::Field(_) => Ok(None),
            SseLine::Data(payload) => {
                if payload == DONE_SENTINEL {
                    self.done = true;
                    return Ok(Some(SseEvent::Done));
                }
                let chunk: ChatStreamChunk =
                    serde_json::from_str(&payload).map_err(|e| SseParseError::InvalidJson {
                        message: e.to_string(),
                    })?;
                Ok(chunk.delta_text().map(|text| SseEvent::Delta {
                    text: text.to_string(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_data_line() {
        assert_eq!(
            SseLine::classify(r#"data: {"x":1}"#),
            SseLine::Data(r#"{"x":1}"#.to_string())
        );
    }

    #[test]
    fn test_classify_data_line_without_space() {
        assert_eq!(
            SseLine::classify("data:[DONE]"),
            SseLine::Data("[DONE]".to_string())
        );
    }

    #[test]
    fn test_classify_empty_and_comment() {
        assert_eq!(SseLine::classify(""), SseLine::Empty);
        assert_eq!(
            SseLine::classify(": keepalive"),
            SseLine::Comment("keepalive".to_string())
        );
    }

    #[test]
    fn test_classify_other_field() {
        assert_eq!(
            SseLine::classify("event: message"),
            SseLine::Field("event: message".to_string())
        );
    }

    #[test]
    fn test_feed_line_delta() {
        let mut parser = SseParser::new();
        let event = parser
            .feed_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap();
        assert_eq!(
            event,
            Some(SseEvent::Delta {
                text: "Hel".to_string()
            })
        );
    }

    #[test]
    fn test_feed_line_role_only_chunk_yields_nothing() {
        let mut parser = SseParser::new();
        let event = parser
            .feed_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#)
            .unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_feed_line_done() {
        let mut parser = SseParser::new();
        let event = parser.feed_line("data: [DONE]").unwrap();
        assert_eq!(event, Some(SseEvent::Done));
        assert!(parser.is_done());
    }

    #[test]
    fn test_lines_after_done_are_ignored() {
        let mut parser = SseParser::new();
        parser.feed_line("data: [DONE]").unwrap();
        let event = parser
            .feed_line(r#"data: {"choices":[{"delta":{"content":"late"}}]}"#)
            .unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_feed_line_invalid_json() {
        let mut parser = SseParser::new();
        let err = parser.feed_line("data: {not json").unwrap_err();
        assert!(matches!(err, SseParseError::InvalidJson { .. }));
    }

    #[test]
    fn test_blank_and_comment_lines_consumed() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed_line("").unwrap(), None);
        assert_eq!(parser.feed_line(": ping").unwrap(), None);
    }

    #[test]
    fn test_full_stream_sequence() {
        let mut parser = SseParser::new();
        let lines = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "",
            "data: [DONE]",
        ];
        let mut texts = Vec::new();
        let mut saw_done = false;
        for line in lines {
            match parser.feed_line(line).unwrap() {
                Some(SseEvent::Delta { text }) => texts.push(text),
                Some(SseEvent::Done) => saw_done = true,
                None => {}
            }
        }
        assert_eq!(texts, vec!["Hel", "lo"]);
        assert!(saw_done);
    }
}
