//! Core data types: conversation exchanges and the chat-completions wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer pair within a conversation thread.
///
/// Created with an empty answer the moment a question is accepted, then
/// grown by appending answer fragments until generation completes. The
/// question is immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// The user's question, exactly as submitted
    pub question: String,
    /// The accumulated answer text (may be partial while streaming)
    pub answer: String,
    /// When the question was submitted
    #[serde(default = "Utc::now")]
    pub asked_at: DateTime<Utc>,
}

impl Exchange {
    /// Create a pending exchange: question set, answer empty.
    pub fn pending(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
            asked_at: Utc::now(),
        }
    }

    /// Append one answer fragment. No delimiter is inserted.
    pub fn push_fragment(&mut self, fragment: &str) {
        self.answer.push_str(fragment);
    }
}

/// Role of a message in a chat-completions request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in the chat-completions wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Build the message list for a completion call: prior exchanges expand to
/// alternating user/assistant messages, followed by the new question.
pub fn build_messages(question: &str, history: &[Exchange]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 1);
    for exchange in history {
        messages.push(ChatMessage::user(exchange.question.clone()));
        messages.push(ChatMessage::assistant(exchange.answer.clone()));
    }
    messages.push(ChatMessage::user(question));
    messages
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Whether the server should stream the response as SSE chunks
    pub stream: bool,
}

impl ChatRequest {
    /// Create a request with the default sampling temperature.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.5,
            stream: false,
        }
    }

    /// Enable or disable server-side streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A choice in a non-streamed completion response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Non-streamed completion response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    /// Extract the answer text from the first choice, if present.
    pub fn answer_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Incremental content delta within a streamed chunk.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ChunkDelta {
    /// Present on the first chunk of a stream
    #[serde(default)]
    pub role: Option<MessageRole>,
    /// A piece of answer text; absent on role-only and final chunks
    #[serde(default)]
    pub content: Option<String>,
}

/// A choice in a streamed completion chunk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One streamed chunk of a completion response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatStreamChunk {
    pub choices: Vec<ChunkChoice>,
}

impl ChatStreamChunk {
    /// Extract the text delta from the first choice, if any.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}
