//! Protocol step vocabulary and rendering rules.
//!
//! A trace is a sequence of [`Step`]s. Every step carries `rendered`, the
//! exact text fragment that was appended to the generation context when the
//! step was produced. Concatenating `rendered` over a whole trace
//! reconstructs the full transcript byte for byte — this is the invariant
//! downstream dataset consumers train on, so the rendering rules here are
//! the single source of truth for it.
//!
//! | Step | Rendered |
//! |------|----------|
//! | `InitialPrompt` | full prompt template render |
//! | `Thought` | `sep + "Thought: " + text` |
//! | `ActionChoice` | `sep + "Action choice: " + choice` |
//! | `FunctionCall` | `sep + 'Call function: {"name": "' + name + '"}, "parameters": ' + params + "<\|wait\|>"` |
//! | `FunctionOutput` | `sep + "Output[" + id + "]: " + output` |
//! | `FinalAnswer` | `"\n\n### FINAL ANSWER\n" + text + "<\|wait\|>"` |
//!
//! `sep` is supplied by the caller: empty for the very first Thought (the
//! prompt template already ends on a fresh line), a single newline
//! everywhere else.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Literal in-text token marking where generation pauses for a function
/// result. Appended after function calls and the final answer.
pub const WAIT_MARKER: &str = "<|wait|>";

/// The constrained option set for the Action Choice step, in the order it
/// is offered to the backend.
pub const ACTION_CHOICES: [&str; 2] = ["call function", "final answer"];

/// Discriminant for the six step kinds.
///
/// Mostly useful for reporting (e.g.
/// [`GenerationFailed`](crate::TraceError::GenerationFailed)) and for
/// structural checks that don't need the step payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The fully rendered prompt that opens every trace.
    InitialPrompt,
    /// A free-text reasoning step.
    Thought,
    /// The constrained continue-or-finish decision.
    ActionChoice,
    /// A function invocation (name + parameters text).
    FunctionCall,
    /// A synthesized function result, labeled with a correlation id.
    FunctionOutput,
    /// The terminal answer section.
    FinalAnswer,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialPrompt => "initial prompt",
            Self::Thought => "thought",
            Self::ActionChoice => "action choice",
            Self::FunctionCall => "function call",
            Self::FunctionOutput => "function output",
            Self::FinalAnswer => "final answer",
        };
        f.write_str(name)
    }
}

/// A short unique token labeling a [`Step::FunctionOutput`] inline in the
/// transcript (`Output[<id>]: ...`), so later Thought or FinalAnswer text
/// can reference it via textual linking.
///
/// Ids are 22 characters drawn from a 57-symbol alphabet (alphanumerics
/// minus the easily confused `0 O 1 I l`), which gives roughly 128 bits of
/// entropy — collisions within a trace, or even across a whole dataset, are
/// negligible without any global coordination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

/// Alphanumerics minus `0 O 1 I l`.
const ID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of a minted id, in characters.
const ID_LEN: usize = 22;

impl CorrelationId {
    /// Mints a fresh random id from the supplied RNG.
    pub fn mint<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Wraps an existing id string, e.g. when rebuilding steps from
    /// stored records.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of an Iterative Resolution Cycle trace.
///
/// Construct steps through the kind-specific constructors
/// ([`thought`](Self::thought), [`function_call`](Self::function_call), …),
/// which apply the rendering rules; the `rendered` field is never assembled
/// by hand outside this module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// The rendered prompt template that opens the trace.
    InitialPrompt {
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
    /// A free-text reasoning step.
    Thought {
        /// The generated thought text (without the `Thought: ` label).
        text: String,
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
    /// The constrained continue-or-finish decision.
    ActionChoice {
        /// The chosen option, one of [`ACTION_CHOICES`].
        choice: String,
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
    /// A function invocation.
    FunctionCall {
        /// The called function's name.
        name: String,
        /// The raw parameters span as generated (JSON-ish text, not parsed).
        parameters: String,
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
    /// A synthesized function result.
    FunctionOutput {
        /// Correlation id labeling this output in the transcript.
        correlation_id: CorrelationId,
        /// The generated output text.
        output: String,
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
    /// The terminal answer.
    FinalAnswer {
        /// The answer text, trailing newlines trimmed.
        text: String,
        /// Exact fragment appended to the generation context.
        rendered: String,
    },
}

impl Step {
    /// Wraps an already rendered prompt as the opening step.
    pub fn initial_prompt(rendered: impl Into<String>) -> Self {
        Self::InitialPrompt {
            rendered: rendered.into(),
        }
    }

    /// Builds a Thought step: `separator + "Thought: " + text`.
    pub fn thought(text: &str, separator: &str) -> Self {
        Self::Thought {
            text: text.to_owned(),
            rendered: format!("{separator}Thought: {text}"),
        }
    }

    /// Builds an Action Choice step: `separator + "Action choice: " + choice`.
    pub fn action_choice(choice: &str, separator: &str) -> Self {
        Self::ActionChoice {
            choice: choice.to_owned(),
            rendered: format!("{separator}Action choice: {choice}"),
        }
    }

    /// Builds a Function Call step, wait marker included:
    /// `separator + 'Call function: {"name": "' + name + '"}, "parameters": ' + parameters + "<|wait|>"`.
    pub fn function_call(name: &str, parameters: &str, separator: &str) -> Self {
        Self::FunctionCall {
            name: name.to_owned(),
            parameters: parameters.to_owned(),
            rendered: format!(
                "{separator}Call function: {{\"name\": \"{name}\"}}, \"parameters\": {parameters}{WAIT_MARKER}"
            ),
        }
    }

    /// Builds a Function Output step:
    /// `separator + "Output[" + id + "]: " + output`.
    pub fn function_output(correlation_id: CorrelationId, output: &str, separator: &str) -> Self {
        let rendered = format!("{separator}Output[{correlation_id}]: {output}");
        Self::FunctionOutput {
            correlation_id,
            output: output.to_owned(),
            rendered,
        }
    }

    /// Builds the terminal Final Answer step, trimming trailing newlines
    /// from the generated text:
    /// `"\n\n### FINAL ANSWER\n" + text + "<|wait|>"`.
    pub fn final_answer(text: &str) -> Self {
        let text = text.trim_end_matches('\n');
        Self::FinalAnswer {
            text: text.to_owned(),
            rendered: format!("\n\n### FINAL ANSWER\n{text}{WAIT_MARKER}"),
        }
    }

    /// The kind tag of this step.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::InitialPrompt { .. } => StepKind::InitialPrompt,
            Self::Thought { .. } => StepKind::Thought,
            Self::ActionChoice { .. } => StepKind::ActionChoice,
            Self::FunctionCall { .. } => StepKind::FunctionCall,
            Self::FunctionOutput { .. } => StepKind::FunctionOutput,
            Self::FinalAnswer { .. } => StepKind::FinalAnswer,
        }
    }

    /// The exact fragment this step appended to the generation context.
    pub fn rendered(&self) -> &str {
        match self {
            Self::InitialPrompt { rendered }
            | Self::Thought { rendered, .. }
            | Self::ActionChoice { rendered, .. }
            | Self::FunctionCall { rendered, .. }
            | Self::FunctionOutput { rendered, .. }
            | Self::FinalAnswer { rendered, .. } => rendered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_rendering() {
        let step = Step::thought("I should check the weather.", "\n");
        assert_eq!(step.rendered(), "\nThought: I should check the weather.");
        assert_eq!(step.kind(), StepKind::Thought);
    }

    #[test]
    fn test_first_thought_has_no_separator() {
        let step = Step::thought("First things first.", "");
        assert_eq!(step.rendered(), "Thought: First things first.");
    }

    #[test]
    fn test_action_choice_rendering() {
        let step = Step::action_choice("final answer", "\n");
        assert_eq!(step.rendered(), "\nAction choice: final answer");
    }

    #[test]
    fn test_function_call_rendering() {
        let step = Step::function_call("get_weather", r#"{"latitude": 46.9}"#, "\n");
        assert_eq!(
            step.rendered(),
            "\nCall function: {\"name\": \"get_weather\"}, \"parameters\": {\"latitude\": 46.9}<|wait|>"
        );
    }

    #[test]
    fn test_function_output_rendering() {
        let mut rng = rand::rng();
        let id = CorrelationId::mint(&mut rng);
        let step = Step::function_output(id.clone(), "{'temperature': 23.0}", "\n");
        assert_eq!(
            step.rendered(),
            format!("\nOutput[{id}]: {{'temperature': 23.0}}")
        );
    }

    #[test]
    fn test_final_answer_rendering_trims_trailing_newlines() {
        let step = Step::final_answer("It will rain today.\n\n");
        assert_eq!(
            step.rendered(),
            "\n\n### FINAL ANSWER\nIt will rain today.<|wait|>"
        );
        match step {
            Step::FinalAnswer { text, .. } => assert_eq!(text, "It will rain today."),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_correlation_id_shape() {
        let mut rng = rand::rng();
        let id = CorrelationId::mint(&mut rng);
        assert_eq!(id.as_str().len(), 22);
        assert!(
            id.as_str()
                .bytes()
                .all(|b| ID_ALPHABET.contains(&b)),
            "id {id} contains characters outside the alphabet"
        );
    }

    #[test]
    fn test_correlation_ids_distinct() {
        let mut rng = rand::rng();
        let a = CorrelationId::mint(&mut rng);
        let b = CorrelationId::mint(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_step_serde_tagging() {
        let step = Step::thought("check inputs", "\n");
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["kind"], "thought");
        assert_eq!(json["text"], "check inputs");

        let back: Step = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, step);
    }

    #[test]
    fn test_step_kind_display() {
        assert_eq!(StepKind::FunctionCall.to_string(), "function call");
        assert_eq!(StepKind::InitialPrompt.to_string(), "initial prompt");
    }
}
