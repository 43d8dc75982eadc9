//! Pre-built helpers for testing code that drives trace generation.
//!
//! Available when the `test-utils` feature is enabled, allowing
//! downstream crates to reuse these utilities in their own test suites.
//! Also compiled during `#[cfg(test)]` for this crate's own tests.
//! Provides a sample function set and queue-loading shorthands for
//! [`MockBackend`].

use crate::mock::MockBackend;

/// A compact two-function descriptor array, weather themed.
pub fn weather_functions_json() -> String {
    serde_json::json!([
        {
            "name": "get_local_weather",
            "description": "Current conditions for a coordinate pair.",
            "parameters": {"latitude": "float", "longitude": "float"}
        },
        {
            "name": "get_forecast",
            "description": "Seven day forecast for a coordinate pair.",
            "parameters": {"latitude": "float", "longitude": "float"}
        }
    ])
    .to_string()
}

/// Queues the spans one call cycle consumes: the thought that opens the
/// cycle, the `call function` choice, the name and parameters spans, and
/// the synthesized output.
///
/// Cycles chain: each cycle's opening thought is the previous cycle's
/// follow-up. Close the trace with [`enqueue_finish`].
pub fn enqueue_call_cycle(mock: &MockBackend, thought: &str, name: &str, parameters: &str, output: &str) {
    mock.queue_text(thought);
    mock.queue_selection("call function");
    mock.queue_text(name);
    mock.queue_text(parameters);
    mock.queue_text(output);
}

/// Queues the spans the closing segment consumes: a thought, the
/// `final answer` choice, and the answer text.
pub fn enqueue_finish(mock: &MockBackend, thought: &str, answer: &str) {
    mock.queue_text(thought);
    mock.queue_selection("final answer");
    mock.queue_text(answer);
}

/// Queues a whole trace that answers directly, without calling a
/// function. Same spans as [`enqueue_finish`]; the name states intent.
pub fn enqueue_direct_answer(mock: &MockBackend, thought: &str, answer: &str) {
    enqueue_finish(mock, thought, answer);
}
