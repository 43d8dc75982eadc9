//! The trace state machine.
//!
//! [`TraceController`] drives one constrained-generation backend through
//! the Iterative Resolution Cycle protocol:
//!
//! ```text
//! Start → AwaitingInitialThought → AwaitingActionChoice
//!       → (AwaitingFunctionCall → AwaitingFunctionOutput
//!          → AwaitingFollowupThought → AwaitingActionChoice)*
//!       → AwaitingFinalAnswer → Done
//! ```
//!
//! The transition taken after an Action Choice is a pure function of the
//! chosen option, the cycles already executed, and the configured bound —
//! see [`after_action_choice`]. The bound is the only termination
//! guarantee that does not depend on model behavior: once it is reached
//! the controller forces the final answer regardless of what the model
//! chose.
//!
//! # Counterfactual branching
//!
//! [`generate_with_counterfactuals`](TraceController::generate_with_counterfactuals)
//! additionally synthesizes, for every FunctionCall the primary trace
//! makes, a sibling trace in which the chosen function does not exist: the
//! function is removed from the available set, a fixed admission Thought
//! is recorded verbatim, and the sibling proceeds straight to its final
//! answer. Siblings are generated strictly sequentially, between the
//! primary's FunctionCall and its FunctionOutput, so they see exactly the
//! scratchpad prefix the primary had at the branch point.
//!
//! # Failure semantics
//!
//! Any backend failure propagates as
//! [`GenerationFailed`](crate::TraceError::GenerationFailed) and the
//! in-progress trace is dropped. There is no partial-state recovery:
//! generation-context identity after a failure is undefined, so a failed
//! trace is never resumed mid-sequence.

use rand::Rng;
use tracing::{debug, info};

use crate::backend::DynGenerationBackend;
use crate::context::GenerationContext;
use crate::error::TraceError;
use crate::generator::StepGenerator;
use crate::step::{CorrelationId, Step, StepKind};
use crate::trace::Trace;

/// The fixed admission recorded as the forced Thought of a
/// missing-function counterfactual trace.
pub const MISSING_FUNCTION_THOUGHT: &str = "I can't find any function that could be helpful to \
     answer user query. I need to abort the Iterative Resolution Cycle and return a final answer.";

/// Tunables for one generation session.
///
/// Use struct update syntax with [`Default`]:
///
/// ```rust
/// use irca_trace::TraceConfig;
///
/// let config = TraceConfig {
///     max_cycles: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TraceConfig {
    /// Upper bound on `(FunctionCall, FunctionOutput, Thought,
    /// ActionChoice)` cycles per trace. Reaching it forces the final
    /// answer.
    pub max_cycles: u32,
    /// Token budget for every free-form span.
    pub step_token_budget: u32,
    /// Sampling temperature for Thought steps.
    pub thought_temperature: f32,
    /// Sampling temperature for FunctionCall name/parameter spans.
    pub call_temperature: f32,
    /// Sampling temperature for synthesized FunctionOutput spans.
    pub output_temperature: f32,
    /// Sampling temperature for the FinalAnswer span.
    pub answer_temperature: f32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            step_token_budget: 500,
            thought_temperature: 0.25,
            call_temperature: 0.0,
            output_temperature: 1.0,
            answer_temperature: 0.5,
        }
    }
}

/// Controller states, one per pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TraceState {
    Start,
    AwaitingInitialThought,
    AwaitingActionChoice,
    AwaitingFunctionCall,
    AwaitingFunctionOutput,
    AwaitingFollowupThought,
    AwaitingFinalAnswer,
    Done,
}

/// Returns true if the choice text asks for a function call.
///
/// Substring match on the lowercased choice, so minor option rewordings
/// (`call function`, `call a function`) keep working.
fn wants_function_call(choice: &str) -> bool {
    choice.to_lowercase().contains("call")
}

/// The transition out of `AwaitingActionChoice`: enter the call cycle iff
/// the model asked for one and the cycle bound has room; otherwise force
/// the final answer.
pub(crate) fn after_action_choice(choice: &str, cycles_used: u32, max_cycles: u32) -> TraceState {
    if wants_function_call(choice) && cycles_used < max_cycles {
        TraceState::AwaitingFunctionCall
    } else {
        TraceState::AwaitingFinalAnswer
    }
}

/// Drives one backend through the protocol, producing ordered traces.
///
/// Holds no global state: the backend reference, the config, and the RNG
/// are all supplied at construction and scoped to this controller. One
/// controller generates one trace at a time; the per-trace context and
/// step sequence are exclusively owned by the running call.
pub struct TraceController<'a, R: Rng> {
    backend: &'a dyn DynGenerationBackend,
    config: TraceConfig,
    rng: R,
}

impl<'a, R: Rng> TraceController<'a, R> {
    /// Creates a controller over the given backend, config, and RNG.
    pub fn new(backend: &'a dyn DynGenerationBackend, config: TraceConfig, rng: R) -> Self {
        Self {
            backend,
            config,
            rng,
        }
    }

    /// The controller's configuration.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Generates one nominal trace for the given available-functions JSON
    /// and user query.
    ///
    /// `available_functions` must be a single-line compact JSON array of
    /// function descriptors (see
    /// [`to_compact_json`](crate::catalog::to_compact_json));
    /// `user_query` a single-line query.
    ///
    /// # Errors
    ///
    /// [`GenerationFailed`](TraceError::GenerationFailed) on any backend
    /// failure; the partial trace is discarded.
    pub async fn generate(
        &mut self,
        available_functions: &str,
        user_query: &str,
    ) -> Result<Trace, TraceError> {
        let (trace, _) = self.run(available_functions, user_query, false).await?;
        Ok(trace)
    }

    /// Generates the nominal trace plus one missing-function sibling per
    /// function call.
    ///
    /// Sibling traces appear in call order, the nominal trace last (so the
    /// nominal trace is always `result.last()`).
    ///
    /// # Errors
    ///
    /// Propagates the first failure from either the primary trace or a
    /// sibling; everything generated so far is discarded.
    pub async fn generate_with_counterfactuals(
        &mut self,
        available_functions: &str,
        user_query: &str,
    ) -> Result<Vec<Trace>, TraceError> {
        let (trace, mut traces) = self.run(available_functions, user_query, true).await?;
        traces.push(trace);
        Ok(traces)
    }

    /// Runs the state machine once, returning the nominal trace and any
    /// siblings. With `branch` set, a missing-function sibling is
    /// generated after every FunctionCall, before its output is
    /// synthesized, so the sibling sees the same scratchpad prefix.
    async fn run(
        &mut self,
        available_functions: &str,
        user_query: &str,
        branch: bool,
    ) -> Result<(Trace, Vec<Trace>), TraceError> {
        let stepgen = StepGenerator::new(self.backend, &self.config);
        let mut siblings = Vec::new();
        let mut trace = Trace::new();
        let mut ctx = GenerationContext::new();
        let mut cycles: u32 = 0;
        let mut state = TraceState::Start;

        while state != TraceState::Done {
            debug!(?state, cycles, siblings = siblings.len(), "advancing trace");
            state = match state {
                TraceState::Start => {
                    stepgen.initial_prompt(&mut ctx, &mut trace, available_functions, user_query, "");
                    TraceState::AwaitingInitialThought
                }
                TraceState::AwaitingInitialThought => {
                    // The prompt template ends on a fresh line, so the
                    // first Thought takes no leading separator.
                    stepgen.thought(&mut ctx, &mut trace, "").await?;
                    TraceState::AwaitingActionChoice
                }
                TraceState::AwaitingActionChoice => {
                    let choice = stepgen.action_choice(&mut ctx, &mut trace, "\n").await?;
                    let next = after_action_choice(&choice, cycles, self.config.max_cycles);
                    if next == TraceState::AwaitingFunctionCall {
                        cycles += 1;
                    }
                    next
                }
                TraceState::AwaitingFunctionCall => {
                    let chosen = stepgen.function_call(&mut ctx, &mut trace, "\n").await?;
                    if branch {
                        let reduced = remove_function(available_functions, &chosen)?;
                        let prefix = trace.branch_prefix()?;
                        let scratchpad: String = prefix
                            .iter()
                            .filter(|s| s.kind() != StepKind::InitialPrompt)
                            .map(Step::rendered)
                            .collect();
                        let separator = if scratchpad.is_empty() { "" } else { "\n" };
                        let sibling = self
                            .missing_function_branch(
                                Trace::new(),
                                &reduced,
                                user_query,
                                &scratchpad,
                                separator,
                            )
                            .await?;
                        siblings.push(sibling);
                    }
                    TraceState::AwaitingFunctionOutput
                }
                TraceState::AwaitingFunctionOutput => {
                    let id = CorrelationId::mint(&mut self.rng);
                    stepgen
                        .function_output(&mut ctx, &mut trace, id, "\n")
                        .await?;
                    TraceState::AwaitingFollowupThought
                }
                TraceState::AwaitingFollowupThought => {
                    stepgen.thought(&mut ctx, &mut trace, "\n").await?;
                    TraceState::AwaitingActionChoice
                }
                TraceState::AwaitingFinalAnswer => {
                    stepgen.final_answer(&mut ctx, &mut trace).await?;
                    TraceState::Done
                }
                TraceState::Done => unreachable!("loop exits on Done"),
            };
        }

        info!(
            steps = trace.len(),
            cycles,
            siblings = siblings.len(),
            "trace completed"
        );
        Ok((trace, siblings))
    }

    /// Generates a missing-function counterfactual trace.
    ///
    /// `starting` must be empty — the sibling is a fresh trace, not a
    /// continuation. The prompt is rendered over the reduced function set
    /// with the shared `scratchpad` prefix, the fixed
    /// [`MISSING_FUNCTION_THOUGHT`] is recorded verbatim
    /// (`thought_separator` empty when the scratchpad is empty, `"\n"`
    /// otherwise), and the trace proceeds directly to its final answer.
    ///
    /// # Errors
    ///
    /// [`BranchPrecondition`](TraceError::BranchPrecondition) if
    /// `starting` is non-empty; [`GenerationFailed`](TraceError::GenerationFailed)
    /// on backend failure.
    pub async fn missing_function_branch(
        &self,
        starting: Trace,
        available_functions: &str,
        user_query: &str,
        scratchpad: &str,
        thought_separator: &str,
    ) -> Result<Trace, TraceError> {
        if !starting.is_empty() {
            return Err(TraceError::BranchPrecondition(format!(
                "missing-function branch requires an empty starting trace, got {} step(s)",
                starting.len()
            )));
        }

        let stepgen = StepGenerator::new(self.backend, &self.config);
        let mut trace = starting;
        let mut ctx = GenerationContext::new();

        stepgen.initial_prompt(
            &mut ctx,
            &mut trace,
            available_functions,
            user_query,
            scratchpad,
        );
        stepgen.forced_thought(&mut ctx, &mut trace, MISSING_FUNCTION_THOUGHT, thought_separator);
        stepgen.final_answer(&mut ctx, &mut trace).await?;

        debug!(steps = trace.len(), "missing-function sibling completed");
        Ok(trace)
    }
}

/// Removes the named function from a JSON array of descriptors, returning
/// the reduced array re-encoded compactly.
fn remove_function(available_functions: &str, name: &str) -> Result<String, TraceError> {
    let mut functions: Vec<serde_json::Value> = serde_json::from_str(available_functions)
        .map_err(|e| TraceError::InvalidCatalog(format!("available functions: {e}")))?;
    functions.retain(|f| f.get("name").and_then(|n| n.as_str()) != Some(name));
    serde_json::to_string(&functions).map_err(|e| TraceError::InvalidCatalog(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TraceConfig::default();
        assert_eq!(config.max_cycles, 10);
        assert_eq!(config.step_token_budget, 500);
        assert!((config.thought_temperature - 0.25).abs() < f32::EPSILON);
        assert!((config.output_temperature - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_after_action_choice_enters_cycle() {
        assert_eq!(
            after_action_choice("call function", 0, 10),
            TraceState::AwaitingFunctionCall
        );
        // Substring rule tolerates rewordings.
        assert_eq!(
            after_action_choice("Call a function", 3, 10),
            TraceState::AwaitingFunctionCall
        );
    }

    #[test]
    fn test_after_action_choice_finishes_on_final_answer() {
        assert_eq!(
            after_action_choice("final answer", 0, 10),
            TraceState::AwaitingFinalAnswer
        );
    }

    #[test]
    fn test_after_action_choice_forces_final_at_bound() {
        // The model keeps asking for calls; the bound wins.
        assert_eq!(
            after_action_choice("call function", 10, 10),
            TraceState::AwaitingFinalAnswer
        );
        assert_eq!(
            after_action_choice("call function", 9, 10),
            TraceState::AwaitingFunctionCall
        );
    }

    #[test]
    fn test_remove_function_filters_by_name() {
        let functions = r#"[{"name": "a", "parameters": {}}, {"name": "b", "parameters": {}}]"#;
        let reduced = remove_function(functions, "a").expect("valid JSON");
        assert!(!reduced.contains("\"a\""));
        assert!(reduced.contains("\"b\""));

        let unchanged = remove_function(functions, "zzz").expect("valid JSON");
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&unchanged).expect("round trip");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_remove_function_rejects_malformed_json() {
        assert!(matches!(
            remove_function("not json", "a"),
            Err(TraceError::InvalidCatalog(_))
        ));
    }
}
