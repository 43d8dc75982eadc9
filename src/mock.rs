//! Mock backend for testing.
//!
//! [`MockBackend`] is a queue-based fake that lets tests control exactly
//! what spans and errors the backend returns, without a model in the
//! loop. It implements [`GenerationBackend`], so it works anywhere a real
//! backend does — including through
//! [`DynGenerationBackend`](crate::DynGenerationBackend) via the blanket
//! impl.
//!
//! # Usage
//!
//! ```rust
//! use irca_trace::mock::MockBackend;
//! use irca_trace::{CompletionRequest, GenerationBackend};
//!
//! # async fn example() {
//! let mock = MockBackend::new("test-model");
//! mock.queue_text("check the forecast first");
//!
//! let completion = mock
//!     .complete(&CompletionRequest {
//!         prompt: "Thought: ".into(),
//!         max_tokens: 500,
//!         stop: vec!["\n".into()],
//!         temperature: 0.25,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(completion.text, "check the forecast first");
//! assert_eq!(mock.recorded_completions().len(), 1);
//! # }
//! ```
//!
//! # Why `MockFailure` instead of `TraceError`?
//!
//! [`TraceError`] carries a boxed source in some variants and is not
//! `Clone`, so it can't sit in a queue. [`MockFailure`] mirrors the
//! backend-level failures in a cloneable form and converts to
//! `TraceError` at dequeue time.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::backend::{
    BackendMetadata, Completion, CompletionRequest, GenerationBackend, SelectionRequest, StopCause,
};
use crate::error::TraceError;

/// A queue-based mock backend for unit and integration tests.
///
/// Push completion spans with [`queue_text`](Self::queue_text) and
/// selections with [`queue_selection`](Self::queue_selection). Each
/// `complete` or `select` call pops from the front of the respective
/// queue and records its request for later assertion.
///
/// # Panics
///
/// [`complete`](GenerationBackend::complete) panics if the completion
/// queue is empty; [`select`](GenerationBackend::select) panics if the
/// selection queue is empty.
pub struct MockBackend {
    completions: Mutex<VecDeque<Result<Completion, MockFailure>>>,
    selections: Mutex<VecDeque<Result<String, MockFailure>>>,
    completion_calls: Mutex<Vec<CompletionRequest>>,
    selection_calls: Mutex<Vec<SelectionRequest>>,
    model: String,
}

/// Cloneable failure for mock queuing.
///
/// Converted to [`TraceError`] when dequeued.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Maps to [`TraceError::BackendUnavailable`].
    Unavailable(String),
}

impl MockFailure {
    fn into_trace_error(self) -> TraceError {
        match self {
            Self::Unavailable(msg) => TraceError::BackendUnavailable(msg),
        }
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completions = self.completions.lock().unwrap().len();
        let selections = self.selections.lock().unwrap().len();
        let calls =
            self.completion_calls.lock().unwrap().len() + self.selection_calls.lock().unwrap().len();
        f.debug_struct("MockBackend")
            .field("model", &self.model)
            .field("queued_completions", &completions)
            .field("queued_selections", &selections)
            .field("recorded_calls", &calls)
            .finish()
    }
}

impl MockBackend {
    /// Creates a new mock serving the given model name, with empty queues.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            selections: Mutex::new(VecDeque::new()),
            completion_calls: Mutex::new(Vec::new()),
            selection_calls: Mutex::new(Vec::new()),
            model: model.into(),
        }
    }

    /// Enqueues a span for the next `complete` call, reported as stopped
    /// by a newline stop sequence.
    pub fn queue_text(&self, text: impl Into<String>) -> &Self {
        self.queue_completion(Completion {
            text: text.into(),
            stop_cause: StopCause::StopSequence("\n".into()),
        })
    }

    /// Enqueues a span for the next `complete` call, reported as cut off
    /// by the token budget.
    pub fn queue_truncated(&self, text: impl Into<String>) -> &Self {
        self.queue_completion(Completion {
            text: text.into(),
            stop_cause: StopCause::TokenBudget,
        })
    }

    /// Enqueues a full [`Completion`] for the next `complete` call.
    pub fn queue_completion(&self, completion: Completion) -> &Self {
        self.completions.lock().unwrap().push_back(Ok(completion));
        self
    }

    /// Enqueues a failure for the next `complete` call.
    pub fn queue_completion_error(&self, failure: MockFailure) -> &Self {
        self.completions.lock().unwrap().push_back(Err(failure));
        self
    }

    /// Enqueues the chosen option for the next `select` call.
    ///
    /// The value is returned verbatim, even if it is not in the request's
    /// option set — that is exactly how tests exercise the caller's
    /// contract check.
    pub fn queue_selection(&self, choice: impl Into<String>) -> &Self {
        self.selections.lock().unwrap().push_back(Ok(choice.into()));
        self
    }

    /// Enqueues a failure for the next `select` call.
    pub fn queue_selection_error(&self, failure: MockFailure) -> &Self {
        self.selections.lock().unwrap().push_back(Err(failure));
        self
    }

    /// Returns a clone of every [`CompletionRequest`] seen, in call order.
    pub fn recorded_completions(&self) -> Vec<CompletionRequest> {
        self.completion_calls.lock().unwrap().clone()
    }

    /// Returns a clone of every [`SelectionRequest`] seen, in call order.
    pub fn recorded_selections(&self) -> Vec<SelectionRequest> {
        self.selection_calls.lock().unwrap().clone()
    }
}

impl GenerationBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TraceError> {
        self.completion_calls.lock().unwrap().push(request.clone());
        let result = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockBackend: no queued completions remaining");
        result.map_err(MockFailure::into_trace_error)
    }

    async fn select(&self, request: &SelectionRequest) -> Result<String, TraceError> {
        self.selection_calls.lock().unwrap().push(request.clone());
        let result = self
            .selections
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockBackend: no queued selections remaining");
        result.map_err(MockFailure::into_trace_error)
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: "mock".into(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion_request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.into(),
            max_tokens: 500,
            stop: vec!["\n".into()],
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_complete_pops_in_fifo_order() {
        let mock = MockBackend::new("test-model");
        mock.queue_text("first").queue_text("second");

        let a = mock.complete(&completion_request("p")).await.unwrap();
        let b = mock.complete(&completion_request("p")).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
    }

    #[tokio::test]
    async fn test_truncated_completion_reports_token_budget() {
        let mock = MockBackend::new("test-model");
        mock.queue_truncated("an unfinished tho");

        let completion = mock.complete(&completion_request("p")).await.unwrap();
        assert_eq!(completion.stop_cause, StopCause::TokenBudget);
    }

    #[tokio::test]
    async fn test_queued_error_converts_at_dequeue() {
        let mock = MockBackend::new("test-model");
        mock.queue_completion_error(MockFailure::Unavailable("socket closed".into()));

        let err = mock.complete(&completion_request("p")).await.unwrap_err();
        assert!(matches!(err, TraceError::BackendUnavailable(_)));
    }

    #[tokio::test]
    #[should_panic(expected = "no queued completions")]
    async fn test_empty_completion_queue_panics() {
        let mock = MockBackend::new("test-model");
        let _ = mock.complete(&completion_request("p")).await;
    }

    #[tokio::test]
    #[should_panic(expected = "no queued selections")]
    async fn test_empty_selection_queue_panics() {
        let mock = MockBackend::new("test-model");
        let _ = mock
            .select(&SelectionRequest {
                prompt: "p".into(),
                options: vec!["a".into()],
            })
            .await;
    }

    #[tokio::test]
    async fn test_records_requests_in_order() {
        let mock = MockBackend::new("test-model");
        mock.queue_text("x").queue_text("y").queue_selection("call function");

        let _ = mock.complete(&completion_request("one")).await;
        let _ = mock.complete(&completion_request("two")).await;
        let _ = mock
            .select(&SelectionRequest {
                prompt: "three".into(),
                options: vec!["call function".into(), "final answer".into()],
            })
            .await;

        let completions = mock.recorded_completions();
        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].prompt, "one");
        assert_eq!(completions[1].prompt, "two");
        assert_eq!(mock.recorded_selections()[0].prompt, "three");
    }

    #[test]
    fn test_metadata_names_mock() {
        let mock = MockBackend::new("test-model");
        let meta = GenerationBackend::metadata(&mock);
        assert_eq!(meta.name, "mock");
        assert_eq!(meta.model, "test-model");
    }

    #[test]
    fn test_debug_reports_queue_depths() {
        let mock = MockBackend::new("test-model");
        mock.queue_text("a").queue_selection("final answer");

        let debug = format!("{mock:?}");
        assert!(debug.contains("queued_completions: 1"));
        assert!(debug.contains("queued_selections: 1"));
        assert!(debug.contains("recorded_calls: 0"));
    }
}
