//! Accumulated generation context for one trace.
//!
//! [`GenerationContext`] is the text the backend has seen so far: the
//! rendered prompt plus every fragment appended since. It is append-only
//! and exclusively owned by the single controller invocation driving the
//! trace — the library never shares a context across logical threads of
//! control, and a context whose last backend call failed is discarded, not
//! resumed.

/// Append-only text buffer holding the accumulated prompt for one trace.
#[derive(Debug, Default)]
pub struct GenerationContext {
    text: String,
}

impl GenerationContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment. Fragments are never removed or rewritten.
    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// The full accumulated text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of the accumulated text, in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
