//! The ordered step sequence produced for one generation request.
//!
//! A [`Trace`] is created empty by the controller, mutated only by
//! appending, and never touched again once the terminal
//! [`FinalAnswer`](crate::Step::FinalAnswer) lands. Ownership is exclusive
//! to the controller invocation that created it; nothing here is shared
//! across concurrent generations.
//!
//! A completed trace always has the shape
//!
//! ```text
//! InitialPrompt, Thought, ActionChoice,
//!   (FunctionCall, FunctionOutput, Thought, ActionChoice)*,
//! FinalAnswer
//! ```
//!
//! and [`transcript`](Trace::transcript) reconstructs exactly the text the
//! backend saw, by concatenating each step's rendered fragment in order.

use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::step::{Step, StepKind};

/// An append-only, ordered sequence of protocol steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    steps: Vec<Step>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    ///
    /// Crate-private: only the controller and step generator mutate traces.
    /// A trace is sealed by its FinalAnswer — appending past it is a logic
    /// error in the state machine.
    pub(crate) fn push(&mut self, step: Step) {
        debug_assert!(
            self.steps
                .last()
                .is_none_or(|last| last.kind() != StepKind::FinalAnswer),
            "appended a step after the terminal FinalAnswer"
        );
        self.steps.push(step);
    }

    /// The steps, in generation order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The most recently appended step.
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Iterates over the steps in order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Reconstructs the full transcript by concatenating every step's
    /// rendered fragment in order.
    ///
    /// For a completed trace this is byte-identical to the text the
    /// generation backend accumulated.
    pub fn transcript(&self) -> String {
        self.steps.iter().map(Step::rendered).collect()
    }

    /// The scratchpad portion of the transcript: every rendered fragment
    /// except InitialPrompt steps.
    ///
    /// Feeding this back into the prompt renderer reproduces the transcript
    /// (the renderer appends the scratchpad verbatim at the end of the
    /// template).
    pub fn scratchpad(&self) -> String {
        self.steps
            .iter()
            .filter(|s| s.kind() != StepKind::InitialPrompt)
            .map(Step::rendered)
            .collect()
    }

    /// Number of steps of the given kind.
    pub fn count_kind(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind() == kind).count()
    }

    /// The prefix of this trace with the trailing
    /// `(Thought, ActionChoice, FunctionCall)` triple removed.
    ///
    /// This is the seam the missing-function counterfactual branch starts
    /// from: everything up to, but excluding, the cycle that chose the
    /// function being removed. The triple is identified by step tags, not
    /// by a fixed offset, so a trace whose tail has any other shape is
    /// rejected with [`TraceError::InvalidTraceShape`].
    pub fn branch_prefix(&self) -> Result<&[Step], TraceError> {
        let n = self.steps.len();
        let tail_kinds = (n >= 3).then(|| {
            (
                self.steps[n - 3].kind(),
                self.steps[n - 2].kind(),
                self.steps[n - 1].kind(),
            )
        });
        match tail_kinds {
            Some((StepKind::Thought, StepKind::ActionChoice, StepKind::FunctionCall)) => {
                Ok(&self.steps[..n - 3])
            }
            _ => Err(TraceError::InvalidTraceShape(format!(
                "branch point requires a trailing Thought/ActionChoice/FunctionCall triple, \
                 trace has {n} step(s) ending in {:?}",
                self.steps.last().map(Step::kind)
            ))),
        }
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::CorrelationId;

    fn sample_trace() -> Trace {
        let mut rng = rand::rng();
        let mut trace = Trace::new();
        trace.push(Step::initial_prompt("PROMPT\n"));
        trace.push(Step::thought("need the weather", ""));
        trace.push(Step::action_choice("call function", "\n"));
        trace.push(Step::function_call("get_weather", "{}", "\n"));
        trace.push(Step::function_output(
            CorrelationId::mint(&mut rng),
            "{'temperature': 23.0}",
            "\n",
        ));
        trace.push(Step::thought("done", "\n"));
        trace.push(Step::action_choice("final answer", "\n"));
        trace.push(Step::final_answer("23 degrees."));
        trace
    }

    #[test]
    fn test_transcript_is_concatenation_of_rendered() {
        let trace = sample_trace();
        let expected: String = trace.steps().iter().map(Step::rendered).collect();
        assert_eq!(trace.transcript(), expected);
        assert!(trace.transcript().starts_with("PROMPT\nThought: "));
        assert!(trace.transcript().ends_with("<|wait|>"));
    }

    #[test]
    fn test_scratchpad_excludes_initial_prompt() {
        let trace = sample_trace();
        let scratchpad = trace.scratchpad();
        assert!(scratchpad.starts_with("Thought: "));
        assert_eq!(format!("PROMPT\n{scratchpad}"), trace.transcript());
    }

    #[test]
    fn test_count_kind() {
        let trace = sample_trace();
        assert_eq!(trace.count_kind(StepKind::Thought), 2);
        assert_eq!(trace.count_kind(StepKind::FunctionCall), 1);
        assert_eq!(trace.count_kind(StepKind::FinalAnswer), 1);
    }

    #[test]
    fn test_branch_prefix_drops_trailing_triple() {
        let mut trace = Trace::new();
        trace.push(Step::initial_prompt("PROMPT\n"));
        trace.push(Step::thought("need the weather", ""));
        trace.push(Step::action_choice("call function", "\n"));
        trace.push(Step::function_call("get_weather", "{}", "\n"));

        let prefix = trace.branch_prefix().expect("well-formed branch point");
        assert_eq!(prefix.len(), 1);
        assert_eq!(prefix[0].kind(), StepKind::InitialPrompt);
    }

    #[test]
    fn test_branch_prefix_keeps_earlier_cycles() {
        let mut rng = rand::rng();
        let mut trace = Trace::new();
        trace.push(Step::initial_prompt("PROMPT\n"));
        trace.push(Step::thought("first", ""));
        trace.push(Step::action_choice("call function", "\n"));
        trace.push(Step::function_call("a", "{}", "\n"));
        trace.push(Step::function_output(CorrelationId::mint(&mut rng), "ok", "\n"));
        trace.push(Step::thought("second", "\n"));
        trace.push(Step::action_choice("call function", "\n"));
        trace.push(Step::function_call("b", "{}", "\n"));

        let prefix = trace.branch_prefix().expect("well-formed branch point");
        assert_eq!(prefix.len(), 5);
        assert_eq!(prefix.last().map(Step::kind), Some(StepKind::FunctionOutput));
    }

    #[test]
    fn test_branch_prefix_rejects_wrong_tail() {
        let trace = sample_trace();
        let err = trace.branch_prefix().unwrap_err();
        assert!(matches!(err, TraceError::InvalidTraceShape(_)));

        let short = Trace::new();
        assert!(matches!(
            short.branch_prefix(),
            Err(TraceError::InvalidTraceShape(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let trace = sample_trace();
        let json = serde_json::to_string(&trace).expect("serialize");
        let back: Trace = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, trace);
    }
}
