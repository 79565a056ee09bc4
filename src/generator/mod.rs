//! Answer generation abstraction.
//!
//! [`AnswerGenerator`] is the seam between the conversation controller and
//! whatever produces answers (a remote completion API, a retrieval chain, a
//! test double). A generator receives the question plus the full prior
//! history of the thread on every call, so implementations carry no
//! conversation memory of their own and one instance can safely serve many
//! threads.

pub mod chat_api;
pub mod mock;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::Exchange;

pub use chat_api::ChatApiGenerator;
pub use mock::{MockAnswer, MockGenerator, RecordedCall};

/// Errors surfaced by answer generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    /// Transport-level failure (connection, DNS, timeout)
    #[error("request failed: {message}")]
    Http { message: String },

    /// The upstream service returned an error status
    #[error("upstream error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded
    #[error("malformed response: {message}")]
    Parse { message: String },

    /// The stream ended without a completion signal
    #[error("stream closed before completion")]
    StreamClosed,
}

impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        GenerateError::Http {
            message: e.to_string(),
        }
    }
}

/// Sender half of a fragment channel. Dropping it signals end-of-stream.
pub type FragmentSender = mpsc::Sender<Result<String, GenerateError>>;

/// An ordered, finite, non-restartable sequence of answer fragments.
///
/// Fragments arrive in emission order over a bounded channel; the channel
/// closing is the explicit end-of-stream signal. A mid-stream failure is
/// delivered in-band as an `Err` item and terminates the sequence.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<String, GenerateError>>,
}

impl FragmentStream {
    /// Default channel capacity for producer tasks.
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Create a connected sender/stream pair.
    pub fn channel(capacity: usize) -> (FragmentSender, FragmentStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, FragmentStream { rx })
    }

    /// Receive the next fragment, or `None` once the stream has completed.
    pub async fn next_fragment(&mut self) -> Option<Result<String, GenerateError>> {
        self.rx.recv().await
    }
}

/// The result of a generation call: either a complete answer or a lazy
/// fragment sequence.
#[derive(Debug)]
pub enum Answer {
    /// The full answer text in one piece
    Complete(String),
    /// Incremental fragments, applied in arrival order
    Stream(FragmentStream),
}

/// Produces an answer for a question given the thread's prior exchanges.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer. `history` holds the thread's exchanges in order,
    /// excluding the question being asked.
    async fn generate(
        &self,
        question: &str,
        history: &[Exchange],
    ) -> Result<Answer, GenerateError>;
}
