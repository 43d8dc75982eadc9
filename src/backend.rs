//! Generation backend trait and request types.
//!
//! This module defines two abstractions:
//!
//! - **[`GenerationBackend`]** — the trait every constrained-generation
//!   backend implements. It uses Rust 2024's native async-fn-in-traits
//!   (AFIT), so implementations are straightforward `async fn`s with no
//!   macro overhead.
//!
//! - **[`DynGenerationBackend`]** — an object-safe mirror of
//!   `GenerationBackend` that uses boxed futures. A blanket
//!   `impl<T: GenerationBackend> DynGenerationBackend for T` bridges the
//!   two, so any concrete backend can be stored as
//!   `&dyn DynGenerationBackend` with zero boilerplate.
//!
//! The trace controller composes exactly two primitives: bounded free-form
//! completion ([`complete`](GenerationBackend::complete)) and constrained
//! selection from an enumerated option set
//! ([`select`](GenerationBackend::select)). Any backend capable of
//! stoppable, temperature-controlled sampling and enumeration-restricted
//! decoding satisfies the contract; determinism under a fixed seed is the
//! backend's responsibility, not the controller's.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// A bounded free-form completion request.
///
/// The prompt is the full accumulated generation context; the backend
/// continues from its end and stops at the first occurrence of any stop
/// sequence or at the token budget, whichever comes first.
///
/// Serializes cleanly to JSON for logging / replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Full accumulated context to continue from.
    pub prompt: String,
    /// Token budget for the generated span.
    pub max_tokens: u32,
    /// Stop sequences; the returned text excludes the matched sequence.
    pub stop: Vec<String>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A constrained-selection request.
///
/// The backend must return exactly one of `options`, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    /// Full accumulated context to continue from.
    pub prompt: String,
    /// The literal option strings, in presentation order.
    pub options: Vec<String>,
}

/// The generated span from a completion call, exclusive of any matched
/// stop sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text.
    pub text: String,
    /// Why generation stopped.
    pub stop_cause: StopCause,
}

/// Why a completion stopped.
///
/// Running out of token budget is not an error — the caller decides
/// whether a truncated span is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// A stop sequence matched; carries the matched sequence.
    StopSequence(String),
    /// The token budget was exhausted before any stop sequence matched.
    TokenBudget,
}

/// Describes a backend instance: its name and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMetadata {
    /// Backend name (e.g. `"guidance"`, `"mock"`). `Cow` so built-in
    /// backends can use static strings without allocating.
    pub name: Cow<'static, str>,
    /// The model identifier the backend is serving.
    pub model: String,
}

/// The trait every constrained-generation backend implements.
///
/// Uses native async-fn-in-traits. Implementations are plain `async fn`s —
/// no `#[async_trait]` needed.
///
/// # Object safety
///
/// `GenerationBackend` is **not** object-safe because AFIT returns
/// `impl Future`. When you need dynamic dispatch, use
/// [`DynGenerationBackend`] — every `GenerationBackend` automatically
/// implements it via a blanket impl.
///
/// # Errors
///
/// Backend-level failures surface as
/// [`TraceError::BackendUnavailable`]. The core never retries; a trace
/// whose backend call failed is discarded whole.
pub trait GenerationBackend: Send + Sync {
    /// Requests a bounded free-form continuation of the prompt.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<Completion, TraceError>> + Send;

    /// Requests generation restricted to exactly one of the supplied
    /// literal option strings.
    fn select(
        &self,
        request: &SelectionRequest,
    ) -> impl Future<Output = Result<String, TraceError>> + Send;

    /// Returns static metadata describing this backend instance.
    fn metadata(&self) -> BackendMetadata;
}

/// Object-safe counterpart of [`GenerationBackend`] for dynamic dispatch.
///
/// You rarely implement this directly — the blanket
/// `impl<T: GenerationBackend> DynGenerationBackend for T` does it for you.
pub trait DynGenerationBackend: Send + Sync {
    /// Boxed-future version of [`GenerationBackend::complete`].
    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Completion, TraceError>> + Send + 'a>>;

    /// Boxed-future version of [`GenerationBackend::select`].
    fn select_boxed<'a>(
        &'a self,
        request: &'a SelectionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, TraceError>> + Send + 'a>>;

    /// Returns static metadata describing this backend instance.
    fn metadata(&self) -> BackendMetadata;
}

impl<T: GenerationBackend> DynGenerationBackend for T {
    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Completion, TraceError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn select_boxed<'a>(
        &'a self,
        request: &'a SelectionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, TraceError>> + Send + 'a>> {
        Box::pin(self.select(request))
    }

    fn metadata(&self) -> BackendMetadata {
        GenerationBackend::metadata(self)
    }
}
