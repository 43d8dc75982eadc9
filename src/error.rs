//! Unified error type for trace generation.
//!
//! Every fallible operation in this crate returns [`TraceError`], giving
//! callers a single type to match against whether the failure came from
//! catalog setup, the generation backend, or the trace controller itself.
//!
//! # Propagation policy
//!
//! Failures propagate unrecovered to the immediate caller. The core never
//! retries a backend call and never resumes a partially generated trace —
//! after a mid-trace failure the generation context is in an undefined
//! position, so the whole trace is discarded. Retry and skip/abort policy
//! belongs to whatever orchestration layer drives batch generation.

use crate::step::StepKind;

/// The unified error type returned by all trace-generation operations.
///
/// Variants are `#[non_exhaustive]` — new error kinds may be added in
/// minor releases without breaking downstream matches (always include a
/// wildcard arm).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TraceError {
    /// Invalid setup detected eagerly at construction time
    /// (e.g. a sampler bound exceeding the catalog size).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The requested catalog version tag is not registered.
    #[error("Unknown catalog version: {version}")]
    UnknownCatalogVersion {
        /// The version tag that was requested.
        version: String,
    },

    /// A catalog document could not be parsed or violated catalog
    /// invariants (e.g. duplicate function names).
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The generation backend failed at the transport or model level.
    ///
    /// Fatal to the in-progress trace; no retry is attempted here.
    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A constrained-choice call returned a value outside the supplied
    /// option set, violating the backend contract.
    #[error("Constrained choice returned a value outside the option set: {returned:?}")]
    InvalidChoice {
        /// The out-of-set value the backend returned.
        returned: String,
    },

    /// A backend failure occurred while generating a specific step.
    ///
    /// Wraps the underlying error with the step kind that was being
    /// generated, so batch orchestration can report where a trace died.
    #[error("Generation failed at {step} step: {source}")]
    GenerationFailed {
        /// The step kind that was being generated when the backend failed.
        step: StepKind,
        /// The underlying failure.
        #[source]
        source: Box<TraceError>,
    },

    /// The missing-function branch was invoked with a non-empty starting
    /// trace. Programming error on the caller's side; no trace is produced.
    #[error("Branch precondition violated: {0}")]
    BranchPrecondition(String),

    /// A trace did not have the structural shape an operation requires
    /// (e.g. branching from a trace whose tail is not a
    /// Thought/ActionChoice/FunctionCall triple).
    #[error("Invalid trace shape: {0}")]
    InvalidTraceShape(String),
}

impl TraceError {
    /// Wraps `self` as a [`GenerationFailed`](Self::GenerationFailed) at
    /// the given step.
    #[must_use]
    pub fn at_step(self, step: StepKind) -> Self {
        Self::GenerationFailed {
            step,
            source: Box::new(self),
        }
    }
}
