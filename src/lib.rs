//! # irca-trace
//!
//! Scripted generation of function-calling reasoning traces.
//!
//! This crate drives a constrained-generation backend through a fixed
//! protocol — the Iterative Resolution Cycle — to produce synthetic
//! training traces: a Thought, a constrained Action Choice, zero or more
//! `(FunctionCall, FunctionOutput, Thought, ActionChoice)` cycles, and a
//! terminal Final Answer. The model fills in free-form spans; the
//! controller owns the structure, the literals, and the stop conditions.
//!
//! Every generated step records the exact text fragment it appended to
//! the backend's context, so concatenating a trace's fragments
//! reconstructs the full transcript byte for byte.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use irca_trace::{FunctionCatalog, TraceConfig, TraceController};
//!
//! # async fn example(backend: &dyn irca_trace::DynGenerationBackend)
//! #     -> Result<(), irca_trace::TraceError> {
//! let catalog = FunctionCatalog::builtin("v1")?;
//! let mut rng = rand::rng();
//!
//! let sampler = catalog.sampler(2, 5, Default::default())?;
//! let subset = sampler.sample(&mut rng);
//! let functions = irca_trace::catalog::to_compact_json(&subset)?;
//!
//! let mut controller = TraceController::new(backend, TraceConfig::default(), rng);
//! let traces = controller
//!     .generate_with_counterfactuals(&functions, "what's the weather in Bern?")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Counterfactual branching
//!
//! [`TraceController::generate_with_counterfactuals`] emits, alongside the
//! nominal trace, one sibling per function call in which the called
//! function has been removed from the available set. The sibling records
//! a fixed admission Thought and answers without the function, yielding a
//! paired example of graceful degradation for every successful call.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`backend`] | The [`GenerationBackend`] trait and request/response types |
//! | [`catalog`] | Function descriptor sets, subset sampling, JSON encoding |
//! | [`context`] | The append-only accumulated prompt for one trace |
//! | [`controller`] | The trace state machine and counterfactual driver |
//! | [`error`] | Unified [`TraceError`] |
//! | [`prompt`] | The one-shot prompt template and its renderer |
//! | [`record`] | Serializable dataset rows |
//! | [`step`] | Step vocabulary, rendering rules, correlation ids |
//! | [`trace`] | The ordered step sequence and transcript reconstruction |

#![warn(missing_docs)]

pub mod backend;
pub mod catalog;
pub mod context;
pub mod controller;
pub mod error;
pub mod prompt;
pub mod record;
pub mod step;
pub mod trace;

mod generator;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

// ── Core re-exports ────────────────────────────────────────────────
//
// Only the types that appear in nearly every program are re-exported
// at the crate root. Everything else lives in its submodule:
//
//   irca_trace::catalog::*   — CountDistribution, SubsetSampler, shuffle
//   irca_trace::prompt::*    — render, PROMPT_TEMPLATE
//   irca_trace::backend::*   — StopCause, BackendMetadata
//   irca_trace::mock::*      — MockBackend (test-utils feature)

pub use backend::{
    Completion, CompletionRequest, DynGenerationBackend, GenerationBackend, SelectionRequest,
};
pub use catalog::{FunctionCatalog, FunctionDescriptor};
pub use context::GenerationContext;
pub use controller::{MISSING_FUNCTION_THOUGHT, TraceConfig, TraceController};
pub use error::TraceError;
pub use record::TraceRecord;
pub use step::{ACTION_CHOICES, CorrelationId, Step, StepKind, WAIT_MARKER};
pub use trace::Trace;
