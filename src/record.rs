//! Serializable dataset records.
//!
//! A [`TraceRecord`] packages one completed trace with the inputs that
//! produced it — the available-functions JSON and the user query — so a
//! corpus of traces can be written out as JSON lines and later rebuilt
//! without the generating session.

use serde::{Deserialize, Serialize};

use crate::trace::Trace;

/// One dataset row: a completed trace plus its generation inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// The compact JSON array of function descriptors the trace saw.
    pub available_functions: String,
    /// The user query the trace answered.
    pub user_query: String,
    /// The ordered steps of the trace.
    pub agent_trace: Trace,
}

impl TraceRecord {
    /// Packages a completed trace with its inputs.
    pub fn new(
        available_functions: impl Into<String>,
        user_query: impl Into<String>,
        agent_trace: Trace,
    ) -> Self {
        Self {
            available_functions: available_functions.into(),
            user_query: user_query.into(),
            agent_trace,
        }
    }
}
