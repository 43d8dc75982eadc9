//! Per-step generation policies.
//!
//! [`StepGenerator`] is a thin layer between the controller's state machine
//! and the backend's two primitives. Each method implements one step kind's
//! policy — which literals to append to the context, which stop sequences
//! and temperature to request — then records the step so that the trace's
//! rendered fragments stay byte-identical to what the context accumulated.
//!
//! Mid-fragment generation is the subtle part: a FunctionCall appends the
//! literal `Call function: {"name": "` before asking the backend for the
//! name span, appends the closing `"}, "parameters": ` literal, then asks
//! for the parameters span. The context therefore grows in sub-step pieces
//! while the trace only ever records whole steps.

use tracing::debug;

use crate::backend::{CompletionRequest, DynGenerationBackend, SelectionRequest};
use crate::context::GenerationContext;
use crate::controller::TraceConfig;
use crate::error::TraceError;
use crate::prompt;
use crate::step::{ACTION_CHOICES, CorrelationId, Step, StepKind, WAIT_MARKER};
use crate::trace::Trace;

/// Composes the backend primitives into protocol steps.
pub(crate) struct StepGenerator<'a> {
    backend: &'a dyn DynGenerationBackend,
    config: &'a TraceConfig,
}

impl<'a> StepGenerator<'a> {
    pub(crate) fn new(backend: &'a dyn DynGenerationBackend, config: &'a TraceConfig) -> Self {
        Self { backend, config }
    }

    fn completion(&self, ctx: &GenerationContext, stop: &[&str], temperature: f32) -> CompletionRequest {
        CompletionRequest {
            prompt: ctx.as_str().to_owned(),
            max_tokens: self.config.step_token_budget,
            stop: stop.iter().map(|s| (*s).to_owned()).collect(),
            temperature,
        }
    }

    /// Renders and records the opening prompt. No backend call.
    pub(crate) fn initial_prompt(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        available_functions: &str,
        user_query: &str,
        scratchpad: &str,
    ) {
        let rendered = prompt::render(available_functions, user_query, scratchpad);
        ctx.append(&rendered);
        trace.push(Step::initial_prompt(rendered));
    }

    /// Generates a Thought step. `separator` is empty for the first
    /// Thought (the prompt ends on a fresh line) and `"\n"` afterwards.
    pub(crate) async fn thought(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        separator: &str,
    ) -> Result<(), TraceError> {
        ctx.append(separator);
        ctx.append("Thought: ");
        let request = self.completion(ctx, &["\n"], self.config.thought_temperature);
        let completion = self
            .backend
            .complete_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::Thought))?;
        ctx.append(&completion.text);
        debug!(text = %completion.text, "thought generated");
        trace.push(Step::thought(&completion.text, separator));
        Ok(())
    }

    /// Records a caller-supplied Thought verbatim, without consulting the
    /// backend. Used for the missing-function admission.
    pub(crate) fn forced_thought(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        text: &str,
        separator: &str,
    ) {
        let step = Step::thought(text, separator);
        ctx.append(step.rendered());
        trace.push(step);
    }

    /// Generates an Action Choice step, constrained to
    /// [`ACTION_CHOICES`]. Returns the chosen option.
    pub(crate) async fn action_choice(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        separator: &str,
    ) -> Result<String, TraceError> {
        ctx.append(separator);
        ctx.append("Action choice: ");
        let request = SelectionRequest {
            prompt: ctx.as_str().to_owned(),
            options: ACTION_CHOICES.iter().map(|s| (*s).to_owned()).collect(),
        };
        let choice = self
            .backend
            .select_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::ActionChoice))?;
        if !ACTION_CHOICES.contains(&choice.as_str()) {
            return Err(TraceError::InvalidChoice { returned: choice }
                .at_step(StepKind::ActionChoice));
        }
        ctx.append(&choice);
        debug!(%choice, "action choice generated");
        trace.push(Step::action_choice(&choice, separator));
        Ok(choice)
    }

    /// Generates a Function Call step: a name span stopped at the closing
    /// quote, then a parameters span stopped at newline or the wait
    /// marker. Returns the called function's name.
    pub(crate) async fn function_call(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        separator: &str,
    ) -> Result<String, TraceError> {
        ctx.append(separator);
        ctx.append("Call function: {\"name\": \"");
        let request = self.completion(ctx, &["\""], self.config.call_temperature);
        let name = self
            .backend
            .complete_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::FunctionCall))?
            .text;

        ctx.append(&name);
        ctx.append("\"}, \"parameters\": ");
        let request = self.completion(ctx, &["\n", WAIT_MARKER], self.config.call_temperature);
        let parameters = self
            .backend
            .complete_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::FunctionCall))?
            .text;
        ctx.append(&parameters);
        ctx.append(WAIT_MARKER);

        debug!(%name, "function call generated");
        trace.push(Step::function_call(&name, &parameters, separator));
        Ok(name)
    }

    /// Generates a Function Output step labeled with the supplied
    /// correlation id. High temperature: outputs are synthesized, not
    /// executed, and variety is the point.
    pub(crate) async fn function_output(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
        correlation_id: CorrelationId,
        separator: &str,
    ) -> Result<(), TraceError> {
        ctx.append(separator);
        ctx.append(&format!("Output[{correlation_id}]: "));
        let request = self.completion(ctx, &["\n"], self.config.output_temperature);
        let completion = self
            .backend
            .complete_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::FunctionOutput))?;
        ctx.append(&completion.text);
        debug!(id = %correlation_id, "function output generated");
        trace.push(Step::function_output(
            correlation_id,
            &completion.text,
            separator,
        ));
        Ok(())
    }

    /// Generates the terminal Final Answer step, stopped at section
    /// markers or the wait marker, trailing newlines trimmed.
    pub(crate) async fn final_answer(
        &self,
        ctx: &mut GenerationContext,
        trace: &mut Trace,
    ) -> Result<(), TraceError> {
        ctx.append("\n\n### FINAL ANSWER\n");
        let request = self.completion(
            ctx,
            &["### INSTRUCTIONS", "### USER QUERY", WAIT_MARKER],
            self.config.answer_temperature,
        );
        let completion = self
            .backend
            .complete_boxed(&request)
            .await
            .map_err(|e| e.at_step(StepKind::FinalAnswer))?;
        let text = completion.text.trim_end_matches('\n');
        ctx.append(text);
        ctx.append(WAIT_MARKER);
        debug!("final answer generated");
        trace.push(Step::final_answer(text));
        Ok(())
    }
}
