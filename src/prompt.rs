//! The fixed protocol prompt template and its renderer.
//!
//! [`render`] performs literal substitution of the three slots
//! (`{available_functions}`, `{user_query}`, `{agent_scratchpad}`) into the
//! protocol instructions. No escaping happens here — callers pass a
//! single-line compact JSON array for the functions and a single-line user
//! query.
//!
//! Two properties of the template matter to the rest of the crate:
//!
//! - The scratchpad slot is the last thing in the template and is preceded
//!   by a newline, so with an empty scratchpad the rendered prompt ends at
//!   the start of a fresh line. The first Thought is therefore generated
//!   with no leading separator.
//! - Because the slot is terminal, `render(f, q, s)` equals
//!   `render(f, q, "") + s` — appending step fragments to the context is
//!   the same as re-rendering with a longer scratchpad, which is what makes
//!   transcript reconstruction compositional.

/// Protocol instructions with a one-shot worked example.
///
/// Slots: `{available_functions}` (single-line JSON array of descriptors),
/// `{user_query}` (single line), `{agent_scratchpad}` (rendered steps so
/// far, empty at trace start).
pub const PROMPT_TEMPLATE: &str = r#"### INSTRUCTIONS
You are an AI assistant with specific functions at your disposal. Your task is to answer the user's question succinctly. Utilize markdown links to refer to detailed data in the context when relevant.
To answer the user's query, engage in the Iterative Resolution Cycle. This cycle involves repeated 'Thought' and 'Call Function' steps until enough information is gathered to formulate a 'Final Thought'.

### ITERATIVE RESOLUTION CYCLE
Thought: Reflect on the necessary steps and functions to answer the question. Clearly state your plan or indicate if you cannot proceed and why.
Action choice: `call function` or `final answer`. This will determine if you will call a function next or if you will break the iterative resolution cycle and return a final answer.
Call function: Execute a function by passing a dictionary with the function's name and parameters in a dictionary format. Include `<|wait|>` after the call to await for results. Repeat the 'Thought' and 'Call Function' steps as necessary until you have all the information required to answer or determine that you cannot answer.

Once you have enough information or need to abort:
Final answer: Conclude the Iterative Resolution Cycle by preparing a concise answer or admitting the inability to provide a satisfactory response due to specific reasons.

Finally, write the response in markdown format, using markdown links to point the user to relevant detailed data if needed.
Action choice: final answer
### FINAL ANSWER
[Your concise final answer here, possibly with links to detailed outputs or a statement of inability to provide an answer with an explanation.]

EXAMPLE:
### ITERATIVE RESOLUTION CYCLE
Thought: To answer the user's request, I need to know the weather at their location. The first step is to identify the user's location.
Call function: {"name": "get_user_location"}<|wait|>
Output[ryuzyRNy98ue2sQkfBgfJr]: {'lat': 46.899, 'long': 56.4546}
Thought: Now, I can use the retrieved location to get the weather at the user's location.
Call function: {"name": "get_weather", "parameters": **Output[ryuzyRNy98ue2sQkfBgfJr])<|wait|>
Output[pTnEwkeyTVpzTjVcseLdrS]: {'temperature': 23.0, 'unit': 'celsius', 'rain': True}
Thought: I have all necessary information to answer the user's request, or I have encountered an issue and cannot proceed.

### FINAL ANSWER
Based on the [weather data](Output[pTnEwkeyTVpzTjVcseLdrS]) at [your current location](Output[ryuzyRNy98ue2sQkfBgfJr]), it is recommended to take an umbrella due to rain.<|wait|>

The functions available to you are described below.

### FUNCTIONS AVAILABLE
{available_functions}

### USER QUERY
{user_query}

### ITERATIVE RESOLUTION CYCLE
{agent_scratchpad}"#;

/// Renders the protocol prompt.
///
/// Pure string substitution: `available_functions` should be a single-line
/// compact JSON array of function descriptors (see
/// [`to_compact_json`](crate::catalog::to_compact_json)), `user_query` a
/// single-line query, and `agent_scratchpad` the concatenated rendered
/// fragments of the steps generated so far (empty at trace start).
///
/// Substitution is a single pass over the template, so a slot literal
/// occurring inside a value (say a query quoting `{agent_scratchpad}`)
/// passes through verbatim.
pub fn render(available_functions: &str, user_query: &str, agent_scratchpad: &str) -> String {
    let mut out = String::with_capacity(
        PROMPT_TEMPLATE.len()
            + available_functions.len()
            + user_query.len()
            + agent_scratchpad.len(),
    );
    let mut rest = PROMPT_TEMPLATE;
    // Slots in template order.
    for (slot, value) in [
        ("{available_functions}", available_functions),
        ("{user_query}", user_query),
        ("{agent_scratchpad}", agent_scratchpad),
    ] {
        let (head, tail) = rest
            .split_once(slot)
            .expect("every slot occurs once in the template");
        out.push_str(head);
        out.push_str(value);
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_slots() {
        let prompt = render(r#"[{"name": "get_weather"}]"#, "What's the weather?", "");
        assert!(prompt.contains("### FUNCTIONS AVAILABLE\n[{\"name\": \"get_weather\"}]"));
        assert!(prompt.contains("### USER QUERY\nWhat's the weather?"));
        assert!(!prompt.contains("{available_functions}"));
        assert!(!prompt.contains("{user_query}"));
        assert!(!prompt.contains("{agent_scratchpad}"));
    }

    #[test]
    fn test_empty_scratchpad_ends_on_fresh_line() {
        let prompt = render("[]", "hi", "");
        assert!(
            prompt.ends_with("### ITERATIVE RESOLUTION CYCLE\n"),
            "first Thought must start at column 0 of a new line"
        );
    }

    #[test]
    fn test_scratchpad_appends_verbatim() {
        // render(f, q, s) == render(f, q, "") + s — the compositionality
        // the transcript-reconstruction invariant rests on.
        let scratchpad = "Thought: thinking\nAction choice: final answer";
        let with = render("[]", "hi", scratchpad);
        let without = render("[]", "hi", "");
        assert_eq!(with, format!("{without}{scratchpad}"));
    }

    #[test]
    fn test_slot_literal_in_value_passes_through() {
        // A value quoting a slot name must not be substituted again.
        let prompt = render("[]", "what does {agent_scratchpad} mean?", "SCRATCH");
        assert!(prompt.contains("### USER QUERY\nwhat does {agent_scratchpad} mean?"));
        assert!(prompt.ends_with("### ITERATIVE RESOLUTION CYCLE\nSCRATCH"));
    }

    #[test]
    fn test_template_keeps_worked_example() {
        let prompt = render("[]", "hi", "");
        assert!(prompt.contains("Output[ryuzyRNy98ue2sQkfBgfJr]"));
        assert!(prompt.contains("get_user_location"));
    }
}
