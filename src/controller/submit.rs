//! Question submission and the incremental answer loop.
//!
//! This is the one piece of real control flow in the controller: validate
//! the question, append a pending exchange, drive the generator, and apply
//! the answer (whole or fragment by fragment) while keeping the processing
//! flag honest on every exit path.

use crate::generator::{Answer, GenerateError};
use crate::models::Exchange;

use super::ConversationController;

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The question was empty or a duplicate of the last one; no state change
    Rejected,
    /// An answer (possibly empty) was fully applied
    Answered,
    /// Generation was cancelled; the partial answer is kept
    Cancelled,
}

impl ConversationController {
    /// Whether to silently drop a submission: blank input, or the exact
    /// question the current thread ended with. Guards against double
    /// submission from a re-render or repeated keypress.
    fn should_reject(&self, question: &str) -> bool {
        if question.trim().is_empty() {
            return true;
        }
        match self.current_exchanges().last() {
            Some(last) => last.question == question,
            None => false,
        }
    }

    /// Submit a question to the current thread and drive it to an answer.
    ///
    /// On acceptance a pending exchange (empty answer) is appended and a
    /// snapshot emitted immediately, so a renderer can show the question
    /// before any answer text exists. Streamed fragments are applied in
    /// arrival order with a snapshot per fragment.
    ///
    /// The processing flag is set for exactly the duration of the attempt:
    /// it resets on success, failure, and cancellation alike. On failure
    /// the accumulated partial answer is kept, never rolled back.
    pub async fn submit_question(
        &mut self,
        raw_text: &str,
    ) -> Result<SubmitOutcome, GenerateError> {
        if self.should_reject(raw_text) {
            tracing::debug!("submission rejected by empty/duplicate guard");
            return Ok(SubmitOutcome::Rejected);
        }

        // A cancel requested while idle must not poison the next turn.
        self.cancel_flag().reset();
        self.set_processing(true);

        let history: Vec<Exchange> = self.current_exchanges().to_vec();
        self.current_thread_mut()
            .push(Exchange::pending(raw_text));
        self.emit_snapshot();

        let generator = self.generator();
        let result = generator.generate(raw_text, &history).await;
        let outcome = match result {
            Ok(Answer::Complete(text)) => {
                self.set_pending_answer(&text);
                self.emit_snapshot();
                Ok(SubmitOutcome::Answered)
            }
            Ok(Answer::Stream(mut stream)) => {
                let mut outcome = Ok(SubmitOutcome::Answered);
                loop {
                    if self.cancel_flag().is_cancelled() {
                        tracing::info!("generation cancelled, keeping partial answer");
                        outcome = Ok(SubmitOutcome::Cancelled);
                        break;
                    }
                    match stream.next_fragment().await {
                        Some(Ok(fragment)) => {
                            self.append_to_pending(&fragment);
                            self.emit_snapshot();
                        }
                        Some(Err(e)) => {
                            outcome = Err(e);
                            break;
                        }
                        None => break,
                    }
                }
                outcome
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "answer generation failed");
        }

        // Hard invariant: a stuck processing flag freezes the input control.
        self.set_processing(false);
        self.emit_snapshot();
        outcome
    }

    /// Replace the pending exchange's answer with the complete text.
    fn set_pending_answer(&mut self, text: &str) {
        if let Some(exchange) = self.current_thread_mut().last_mut() {
            exchange.answer = text.to_string();
        }
    }

    /// Append one fragment to the pending exchange's answer.
    fn append_to_pending(&mut self, fragment: &str) {
        if let Some(exchange) = self.current_thread_mut().last_mut() {
            exchange.push_fragment(fragment);
        }
    }
}
