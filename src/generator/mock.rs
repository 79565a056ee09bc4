//! Mock answer generator for testing.
//!
//! Provides a configurable generator that replays scripted answers and
//! records the calls it receives, allowing tests to drive the conversation
//! controller without network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::Exchange;

use super::{Answer, AnswerGenerator, FragmentStream, GenerateError};

/// A recorded generation call for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The question passed to `generate`
    pub question: String,
    /// The history snapshot passed alongside it
    pub history: Vec<Exchange>,
}

/// Scripted behavior for one generation call.
#[derive(Debug, Clone)]
pub enum MockAnswer {
    /// Return a complete answer string
    Complete(String),
    /// Stream the given fragments in order, then finish cleanly
    Fragments(Vec<String>),
    /// Fail the call before any answer is produced
    Failure(GenerateError),
    /// Stream some fragments, then fail in-band
    FailAfter {
        fragments: Vec<String>,
        error: GenerateError,
    },
}

/// Mock generator replaying scripted answers.
///
/// Answers are consumed from a queue, one per call; when the queue is
/// empty the default answer is used. All calls are recorded.
///
/// # Example
///
/// ```ignore
/// let generator = MockGenerator::new();
/// generator.enqueue(MockAnswer::Fragments(vec!["Hel".into(), "lo".into()]));
///
/// let answer = generator.generate("hi", &[]).await?;
/// assert_eq!(generator.calls().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockGenerator {
    script: Arc<Mutex<VecDeque<MockAnswer>>>,
    default_answer: Arc<Mutex<MockAnswer>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockGenerator {
    /// Create a mock whose default answer is an empty complete string.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_answer: Arc::new(Mutex::new(MockAnswer::Complete(String::new()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience constructor: always answer with the given complete string.
    pub fn completing(text: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.set_default(MockAnswer::Complete(text.into()));
        mock
    }

    /// Convenience constructor: always stream the given fragments.
    pub fn streaming(fragments: Vec<&str>) -> Self {
        let mock = Self::new();
        mock.set_default(MockAnswer::Fragments(
            fragments.into_iter().map(String::from).collect(),
        ));
        mock
    }

    /// Queue a scripted answer for the next unscripted call.
    pub fn enqueue(&self, answer: MockAnswer) {
        self.script.lock().unwrap().push_back(answer);
    }

    /// Set the answer used when the script queue is empty.
    pub fn set_default(&self, answer: MockAnswer) {
        *self.default_answer.lock().unwrap() = answer;
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_answer(&self) -> MockAnswer {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_answer.lock().unwrap().clone())
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_fragment_task(fragments: Vec<String>, error: Option<GenerateError>) -> FragmentStream {
    let (tx, stream) = FragmentStream::channel(FragmentStream::DEFAULT_CAPACITY);
    tokio::spawn(async move {
        for fragment in fragments {
            if tx.send(Ok(fragment)).await.is_err() {
                return;
            }
        }
        if let Some(error) = error {
            let _ = tx.send(Err(error)).await;
        }
    });
    stream
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    async fn generate(
        &self,
        question: &str,
        history: &[Exchange],
    ) -> Result<Answer, GenerateError> {
        self.calls.lock().unwrap().push(RecordedCall {
            question: question.to_string(),
            history: history.to_vec(),
        });

        match self.next_answer() {
            MockAnswer::Complete(text) => Ok(Answer::Complete(text)),
            MockAnswer::Fragments(fragments) => {
                Ok(Answer::Stream(spawn_fragment_task(fragments, None)))
            }
            MockAnswer::Failure(error) => Err(error),
            MockAnswer::FailAfter { fragments, error } => {
                Ok(Answer::Stream(spawn_fragment_task(fragments, Some(error))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completing_mock_returns_full_answer() {
        let generator = MockGenerator::completing("hello");
        let answer = generator.generate("hi", &[]).await.unwrap();
        match answer {
            Answer::Complete(text) => assert_eq!(text, "hello"),
            Answer::Stream(_) => panic!("expected complete answer"),
        }
    }

    #[tokio::test]
    async fn test_streaming_mock_delivers_fragments_in_order() {
        let generator = MockGenerator::streaming(vec!["Hel", "lo", "!"]);
        let answer = generator.generate("hi", &[]).await.unwrap();
        let Answer::Stream(mut stream) = answer else {
            panic!("expected stream");
        };
        let mut collected = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            collected.push_str(&fragment.unwrap());
        }
        assert_eq!(collected, "Hello!");
    }

    #[tokio::test]
    async fn test_scripted_answers_consumed_in_order() {
        let generator = MockGenerator::new();
        generator.enqueue(MockAnswer::Complete("first".to_string()));
        generator.enqueue(MockAnswer::Failure(GenerateError::StreamClosed));

        match generator.generate("a", &[]).await.unwrap() {
            Answer::Complete(text) => assert_eq!(text, "first"),
            Answer::Stream(_) => panic!("expected complete answer"),
        }
        assert_eq!(
            generator.generate("b", &[]).await.unwrap_err(),
            GenerateError::StreamClosed
        );
        // Queue exhausted, falls back to the default empty answer
        assert!(matches!(
            generator.generate("c", &[]).await.unwrap(),
            Answer::Complete(text) if text.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_calls_are_recorded_with_history() {
        let generator = MockGenerator::completing("ok");
        let history = vec![Exchange {
            question: "q1".to_string(),
            answer: "a1".to_string(),
            asked_at: chrono::Utc::now(),
        }];
        generator.generate("q2", &history).await.unwrap();

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].question, "q2");
        assert_eq!(calls[0].history.len(), 1);
        assert_eq!(calls[0].history[0].question, "q1");
    }

    #[tokio::test]
    async fn test_fail_after_streams_then_errors() {
        let generator = MockGenerator::new();
        generator.enqueue(MockAnswer::FailAfter {
            fragments: vec!["par".to_string(), "tial".to_string()],
            error: GenerateError::Http {
                message: "connection reset".to_string(),
            },
        });

        let Answer::Stream(mut stream) = generator.generate("hi", &[]).await.unwrap() else {
            panic!("expected stream");
        };
        assert_eq!(stream.next_fragment().await, Some(Ok("par".to_string())));
        assert_eq!(stream.next_fragment().await, Some(Ok("tial".to_string())));
        assert!(matches!(
            stream.next_fragment().await,
            Some(Err(GenerateError::Http { .. }))
        ));
        assert!(stream.next_fragment().await.is_none());
    }
}
