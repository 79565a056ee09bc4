//! Chat-completions API generator.
//!
//! Talks to an OpenAI-style `/chat/completions` endpoint over HTTP. In
//! streaming mode the SSE response body is decoded by a spawned task that
//! forwards text deltas through a bounded [`FragmentStream`] channel, which
//! keeps fragment delivery strictly in emission order.

use futures_util::StreamExt;
use reqwest::Client;

use crate::config::Config;
use crate::models::{build_messages, ChatRequest, ChatResponse, Exchange};
use crate::sse::{SseEvent, SseParser};

use super::{Answer, AnswerGenerator, FragmentSender, FragmentStream, GenerateError};

/// Generator backed by a chat-completions HTTP endpoint.
pub struct ChatApiGenerator {
    /// Reusable HTTP client
    client: Client,
    /// Base URL of the API, e.g. `https://api.openai.com/v1`
    api_base: String,
    /// Bearer credential sent with every request
    api_key: String,
    /// Model identifier sent in the request body
    model: String,
    /// Whether to request a streamed response
    stream_responses: bool,
}

impl ChatApiGenerator {
    /// Create a generator from resolved configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            stream_responses: config.stream_responses,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    async fn send_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, GenerateError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for ChatApiGenerator {
    async fn generate(
        &self,
        question: &str,
        history: &[Exchange],
    ) -> Result<Answer, GenerateError> {
        let messages = build_messages(question, history);
        let request =
            ChatRequest::new(self.model.clone(), messages).with_stream(self.stream_responses);

        tracing::debug!(
            model = %self.model,
            streaming = self.stream_responses,
            history_len = history.len(),
            "sending completion request"
        );

        let response = self.send_request(&request).await?;

        if !self.stream_responses {
            let body: ChatResponse = response.json().await.map_err(|e| GenerateError::Parse {
                message: e.to_string(),
            })?;
            let text = body.answer_text().ok_or_else(|| GenerateError::Parse {
                message: "response contained no choices".to_string(),
            })?;
            return Ok(Answer::Complete(text.to_string()));
        }

        let (tx, stream) = FragmentStream::channel(FragmentStream::DEFAULT_CAPACITY);
        tokio::spawn(forward_sse_body(response, tx));
        Ok(Answer::Stream(stream))
    }
}

/// Read the SSE response body line by line and forward text deltas.
///
/// Ends the stream by dropping the sender: after the `[DONE]` sentinel for
/// a clean finish, or after delivering one in-band error for a transport or
/// parse failure. A body that ends without the sentinel reports
/// [`GenerateError::StreamClosed`].
async fn forward_sse_body(response: reqwest::Response, tx: FragmentSender) {
    let mut bytes_stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut buffer: Vec<u8> = Vec::new();

    'outer: while let Some(chunk) = bytes_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(GenerateError::from(e))).await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);

            match parser.feed_line(line) {
                Ok(Some(SseEvent::Delta { text })) => {
                    // Receiver dropped means the consumer went away; stop reading.
                    if tx.send(Ok(text)).await.is_err() {
                        return;
                    }
                }
                Ok(Some(SseEvent::Done)) => break 'outer,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed stream line");
                    let _ = tx
                        .send(Err(GenerateError::Parse {
                            message: e.to_string(),
                        }))
                        .await;
                    return;
                }
            }
        }
    }

    // The body may end without terminating its last line; flush it.
    if !parser.is_done() && !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(['\n', '\r']);
        match parser.feed_line(line) {
            Ok(Some(SseEvent::Delta { text })) => {
                if tx.send(Ok(text)).await.is_err() {
                    return;
                }
            }
            Ok(Some(SseEvent::Done)) | Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed stream line");
                let _ = tx
                    .send(Err(GenerateError::Parse {
                        message: e.to_string(),
                    }))
                    .await;
                return;
            }
        }
    }

    if !parser.is_done() {
        let _ = tx.send(Err(GenerateError::StreamClosed)).await;
    }
}
