// shared-types-rs/src/event.rs
// Failure events emitted by the pipeline runner and the diagnosis request
// derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context key holding the pipeline identifier
pub const CONTEXT_PIPELINE_ID: &str = "pipeline_id";

/// Context key holding the RFC 3339 failure timestamp
pub const CONTEXT_OCCURRED_AT: &str = "occurred_at";

/// Largest stack trace forwarded to the diagnosis service; the innermost
/// frames at the end are the ones kept.
pub const MAX_REQUEST_STACK_BYTES: usize = 64 * 1024;

/// Last `max` bytes of `s`, on a char boundary
pub fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// A failed pipeline step, as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub pipeline_id: String,
    pub run_id: String,
    pub step_name: String,
    pub error_summary: String,
    #[serde(default)]
    pub error_stack: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Run metadata (completed steps, attempt number, recent log lines)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FailureEvent {
    /// Create an event stamped with the current time
    pub fn new(
        pipeline_id: impl Into<String>,
        run_id: impl Into<String>,
        step_name: impl Into<String>,
        error_summary: impl Into<String>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            run_id: run_id.into(),
            step_name: step_name.into(),
            error_summary: error_summary.into(),
            error_stack: None,
            occurred_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.error_stack = Some(stack.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Body of `POST /diagnose`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub run_id: String,
    #[serde(default)]
    pub step_name: String,
    pub error_summary: String,
    #[serde(default)]
    pub error_stack: Option<String>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl DiagnosisRequest {
    /// Build the request for a failure event.
    ///
    /// Pure and total: the same event always yields the same request. The
    /// context is the event metadata plus the pipeline id and timestamp;
    /// those two keys win over metadata entries with the same name. The stack
    /// is cut to its last MAX_REQUEST_STACK_BYTES so the request always fits
    /// the service's body limit.
    pub fn from_event(event: &FailureEvent) -> Self {
        let mut context = event.metadata.clone();
        context.insert(CONTEXT_PIPELINE_ID.to_string(), event.pipeline_id.clone());
        context.insert(CONTEXT_OCCURRED_AT.to_string(), event.occurred_at.to_rfc3339());

        Self {
            run_id: event.run_id.clone(),
            step_name: event.step_name.clone(),
            error_summary: event.error_summary.clone(),
            error_stack: event
                .error_stack
                .as_deref()
                .map(|stack| tail(stack, MAX_REQUEST_STACK_BYTES).to_string()),
            context,
        }
    }
}
