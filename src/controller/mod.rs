//! Conversation controller: named threads of question/answer exchanges.
//!
//! [`ConversationController`] owns all conversation state. The rendering
//! layer never holds references into it; instead a read-only
//! [`ControllerSnapshot`] is published over an mpsc channel after every
//! mutation. Thread enumeration order is insertion order, tracked by an
//! explicit order list alongside the name-to-thread map.

mod submit;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::generator::AnswerGenerator;
use crate::models::Exchange;

pub use submit::SubmitOutcome;

/// Name of the thread that exists when a controller is created.
pub const DEFAULT_THREAD_NAME: &str = "Intros";

/// Name of the replacement thread created when the last thread is deleted.
pub const REPLACEMENT_THREAD_NAME: &str = "New Chat";

/// Controller-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// A thread name was referenced that does not exist
    #[error("no thread named {name:?}")]
    ThreadNotFound { name: String },
}

/// One thread in a state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSnapshot {
    pub name: String,
    pub exchanges: Vec<Exchange>,
}

/// Read-only view of controller state, published after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    /// All threads, in insertion order
    pub threads: Vec<ThreadSnapshot>,
    /// Name of the current thread (always present in `threads`)
    pub current_thread: String,
    /// Whether a question is currently being answered
    pub processing: bool,
}

impl ControllerSnapshot {
    /// Find a thread's exchanges by name.
    pub fn thread(&self, name: &str) -> Option<&[Exchange]> {
        self.threads
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.exchanges.as_slice())
    }

    /// The current thread's exchanges.
    pub fn current_exchanges(&self) -> &[Exchange] {
        self.thread(&self.current_thread).unwrap_or(&[])
    }
}

/// Handle for requesting cooperative cancellation of an in-flight answer.
///
/// The flag is checked between fragments; whatever partial answer has
/// accumulated is kept.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation of the current generation, if any.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Owns an ordered collection of named conversation threads and drives
/// answer generation against an injected [`AnswerGenerator`].
///
/// One controller serves one user session; a submission runs to completion
/// before the next command is accepted, so no two generation calls ever
/// run concurrently against the same thread.
pub struct ConversationController {
    /// Threads indexed by name
    threads: HashMap<String, Vec<Exchange>>,
    /// Thread names in insertion order
    thread_order: Vec<String>,
    /// Name of the current thread; always a key of `threads`
    current_thread: String,
    /// True strictly between question acceptance and the final fragment
    processing: bool,
    /// Injected answer source
    generator: Arc<dyn AnswerGenerator>,
    /// Snapshot channel to the rendering layer, if attached
    snapshot_tx: Option<mpsc::UnboundedSender<ControllerSnapshot>>,
    /// Cooperative cancellation flag shared with handed-out handles
    cancel: CancelHandle,
}

impl ConversationController {
    /// Create a controller with a single empty default thread and no
    /// snapshot channel.
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        let mut threads = HashMap::new();
        threads.insert(DEFAULT_THREAD_NAME.to_string(), Vec::new());
        Self {
            threads,
            thread_order: vec![DEFAULT_THREAD_NAME.to_string()],
            current_thread: DEFAULT_THREAD_NAME.to_string(),
            processing: false,
            generator,
            snapshot_tx: None,
            cancel: CancelHandle::default(),
        }
    }

    /// Create a controller that publishes a snapshot after every mutation.
    pub fn with_snapshots(
        generator: Arc<dyn AnswerGenerator>,
        snapshot_tx: mpsc::UnboundedSender<ControllerSnapshot>,
    ) -> Self {
        let mut controller = Self::new(generator);
        controller.snapshot_tx = Some(snapshot_tx);
        controller
    }

    /// A handle that can cancel an in-flight answer from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Insert a new empty thread under `name` and make it current.
    ///
    /// An existing thread of the same name is overwritten: its exchanges
    /// are cleared and it keeps its position in the enumeration order.
    pub fn create_thread(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.threads.contains_key(&name) {
            self.thread_order.push(name.clone());
        }
        self.threads.insert(name.clone(), Vec::new());
        self.current_thread = name;
        self.emit_snapshot();
    }

    /// Delete the current thread.
    ///
    /// If that was the last thread, a replacement default thread is created
    /// so at least one thread always exists. The current thread becomes the
    /// first remaining thread in insertion order.
    pub fn delete_current_thread(&mut self) {
        self.threads.remove(&self.current_thread);
        self.thread_order.retain(|name| name != &self.current_thread);

        if self.threads.is_empty() {
            self.threads
                .insert(REPLACEMENT_THREAD_NAME.to_string(), Vec::new());
            self.thread_order.push(REPLACEMENT_THREAD_NAME.to_string());
        }
        self.current_thread = self.thread_order[0].clone();
        self.emit_snapshot();
    }

    /// Switch the current thread to `name`.
    ///
    /// Referencing a nonexistent thread is a caller error and fails loudly.
    pub fn switch_thread(&mut self, name: &str) -> Result<(), ControllerError> {
        if !self.threads.contains_key(name) {
            return Err(ControllerError::ThreadNotFound {
                name: name.to_string(),
            });
        }
        self.current_thread = name.to_string();
        self.emit_snapshot();
        Ok(())
    }

    /// All thread names, in the order threads were inserted.
    pub fn thread_names(&self) -> Vec<String> {
        self.thread_order.clone()
    }

    /// Name of the current thread.
    pub fn current_thread_name(&self) -> &str {
        &self.current_thread
    }

    /// Exchanges of the named thread, if it exists.
    pub fn exchanges(&self, name: &str) -> Option<&[Exchange]> {
        self.threads.get(name).map(Vec::as_slice)
    }

    /// Exchanges of the current thread.
    pub fn current_exchanges(&self) -> &[Exchange] {
        // Invariant: current_thread is always a valid key.
        self.threads
            .get(&self.current_thread)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a question is currently being answered.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Build a read-only snapshot of the full controller state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let threads = self
            .thread_order
            .iter()
            .map(|name| ThreadSnapshot {
                name: name.clone(),
                exchanges: self.threads.get(name).cloned().unwrap_or_default(),
            })
            .collect();
        ControllerSnapshot {
            threads,
            current_thread: self.current_thread.clone(),
            processing: self.processing,
        }
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    pub(crate) fn cancel_flag(&self) -> &CancelHandle {
        &self.cancel
    }

    pub(crate) fn generator(&self) -> Arc<dyn AnswerGenerator> {
        Arc::clone(&self.generator)
    }

    pub(crate) fn current_thread_mut(&mut self) -> &mut Vec<Exchange> {
        self.threads
            .get_mut(&self.current_thread)
            .expect("current thread must exist")
    }

    /// Publish a snapshot to the rendering layer, if one is attached.
    pub(crate) fn emit_snapshot(&self) {
        if let Some(tx) = &self.snapshot_tx {
            // Receiver gone means no renderer is listening; not an error.
            let _ = tx.send(self.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    fn controller() -> ConversationController {
        ConversationController::new(Arc::new(MockGenerator::new()))
    }

    #[test]
    fn test_new_controller_has_default_thread() {
        let controller = controller();
        assert_eq!(controller.thread_names(), vec![DEFAULT_THREAD_NAME]);
        assert_eq!(controller.current_thread_name(), DEFAULT_THREAD_NAME);
        assert!(controller.current_exchanges().is_empty());
        assert!(!controller.is_processing());
    }

    #[test]
    fn test_create_thread_becomes_current() {
        let mut controller = controller();
        controller.create_thread("Rust questions");
        assert_eq!(controller.current_thread_name(), "Rust questions");
        assert_eq!(
            controller.thread_names(),
            vec![DEFAULT_THREAD_NAME, "Rust questions"]
        );
    }

    #[test]
    fn test_create_thread_overwrites_and_keeps_position() {
        let mut controller = controller();
        controller.create_thread("a");
        controller.create_thread("b");
        controller.current_thread_mut().push(Exchange::pending("q"));
        controller.create_thread("a");

        // "a" keeps its original slot and "b" was not touched
        assert_eq!(controller.thread_names(), vec![DEFAULT_THREAD_NAME, "a", "b"]);
        assert!(controller.exchanges("a").unwrap().is_empty());
        assert_eq!(controller.exchanges("b").unwrap().len(), 1);
        assert_eq!(controller.current_thread_name(), "a");
    }

    #[test]
    fn test_delete_last_thread_creates_replacement() {
        let mut controller = controller();
        controller.delete_current_thread();
        assert_eq!(controller.thread_names(), vec![REPLACEMENT_THREAD_NAME]);
        assert_eq!(controller.current_thread_name(), REPLACEMENT_THREAD_NAME);
    }

    #[test]
    fn test_delete_current_picks_first_in_insertion_order() {
        let mut controller = controller();
        controller.create_thread("second");
        controller.create_thread("third");
        controller.switch_thread("second").unwrap();
        controller.delete_current_thread();

        assert_eq!(
            controller.thread_names(),
            vec![DEFAULT_THREAD_NAME, "third"]
        );
        assert_eq!(controller.current_thread_name(), DEFAULT_THREAD_NAME);
    }

    #[test]
    fn test_switch_thread_unknown_name_fails() {
        let mut controller = controller();
        let err = controller.switch_thread("nope").unwrap_err();
        assert_eq!(
            err,
            ControllerError::ThreadNotFound {
                name: "nope".to_string()
            }
        );
        // Current thread unchanged
        assert_eq!(controller.current_thread_name(), DEFAULT_THREAD_NAME);
    }

    #[test]
    fn test_thread_names_preserve_insertion_order() {
        let mut controller = controller();
        for name in ["zebra", "apple", "mango"] {
            controller.create_thread(name);
        }
        assert_eq!(
            controller.thread_names(),
            vec![DEFAULT_THREAD_NAME, "zebra", "apple", "mango"]
        );
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut controller = controller();
        controller.create_thread("work");
        controller.current_thread_mut().push(Exchange::pending("q"));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_thread, "work");
        assert!(!snapshot.processing);
        assert_eq!(snapshot.thread(DEFAULT_THREAD_NAME).unwrap().len(), 0);
        assert_eq!(snapshot.current_exchanges().len(), 1);
        assert_eq!(snapshot.current_exchanges()[0].question, "q");
    }

    #[test]
    fn test_mutations_emit_snapshots() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller =
            ConversationController::with_snapshots(Arc::new(MockGenerator::new()), tx);

        controller.create_thread("a");
        controller.switch_thread(DEFAULT_THREAD_NAME).unwrap();
        controller.delete_current_thread();

        let mut snapshots = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            snapshots.push(snapshot);
        }
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].current_thread, "a");
        assert_eq!(snapshots[1].current_thread, DEFAULT_THREAD_NAME);
        assert_eq!(snapshots[2].current_thread, "a");
    }

    #[test]
    fn test_cancel_handle_roundtrip() {
        let controller = controller();
        let handle = controller.cancel_handle();
        assert!(!controller.cancel_flag().is_cancelled());
        handle.cancel();
        assert!(controller.cancel_flag().is_cancelled());
        controller.cancel_flag().reset();
        assert!(!controller.cancel_flag().is_cancelled());
    }
}
