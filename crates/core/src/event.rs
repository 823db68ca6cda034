// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution events — the atomic unit of durable history.
//!
//! All runtime state is derived from the event log, never from mutable
//! state. Events are append-only: once committed they are read many times
//! and never changed. Cumulative counters on successive events are
//! monotonically non-decreasing.

use crate::execution::ExecutionId;
use crate::state_machine::LifecycleState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Taxonomy of everything that can be appended to an execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // -- execution lifecycle --
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,

    // -- step lifecycle --
    StepStarted,
    StepCompleted,
    StepFailed,

    // -- state transitions --
    StateEnter,
    StateExit,

    // -- tool operations --
    ToolCall,
    ToolCallSuccess,
    ToolCallFailed,
    IdempotentToolSkipped,

    // -- policy --
    PolicyViolation,
    TokenBudgetExceeded,
    MaxStepsExceeded,
    TimeoutExceeded,

    // -- resilience --
    RetryAttempted,

    // -- general --
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ExecutionStarted => "EXECUTION_STARTED",
            EventType::ExecutionCompleted => "EXECUTION_COMPLETED",
            EventType::ExecutionFailed => "EXECUTION_FAILED",
            EventType::StepStarted => "STEP_STARTED",
            EventType::StepCompleted => "STEP_COMPLETED",
            EventType::StepFailed => "STEP_FAILED",
            EventType::StateEnter => "STATE_ENTER",
            EventType::StateExit => "STATE_EXIT",
            EventType::ToolCall => "TOOL_CALL",
            EventType::ToolCallSuccess => "TOOL_CALL_SUCCESS",
            EventType::ToolCallFailed => "TOOL_CALL_FAILED",
            EventType::IdempotentToolSkipped => "IDEMPOTENT_TOOL_SKIPPED",
            EventType::PolicyViolation => "POLICY_VIOLATION",
            EventType::TokenBudgetExceeded => "TOKEN_BUDGET_EXCEEDED",
            EventType::MaxStepsExceeded => "MAX_STEPS_EXCEEDED",
            EventType::TimeoutExceeded => "TIMEOUT_EXCEEDED",
            EventType::RetryAttempted => "RETRY_ATTEMPTED",
            EventType::Error => "ERROR",
        }
    }

    /// A terminated execution ends with exactly one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventType::ExecutionCompleted
                | EventType::ExecutionFailed
                | EventType::PolicyViolation
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation failures for events presented to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event has empty execution_id")]
    EmptyExecutionId,
    #[error("{event_type} event is missing required field {field}")]
    MissingField {
        event_type: EventType,
        field: &'static str,
    },
}

/// An atomic record of a transition, action, or outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: ExecutionId,
    pub step_number: u64,
    pub event_type: EventType,
    pub timestamp_ms: u64,

    /// Lifecycle state, for STATE_ENTER / STATE_EXIT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    // Cumulative metrics as of this event
    #[serde(default)]
    pub cumulative_tokens: u64,
    #[serde(default)]
    pub cumulative_steps: u64,
    #[serde(default)]
    pub cumulative_tool_calls: u64,

    /// Tokens consumed by this step alone.
    #[serde(default)]
    pub step_tokens: u64,

    // Trace context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    // Replay metadata
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_replay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_execution_id: Option<ExecutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_from_step: Option<u64>,
}

impl ExecutionEvent {
    pub fn new(
        execution_id: ExecutionId,
        step_number: u64,
        event_type: EventType,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            execution_id,
            step_number,
            event_type,
            timestamp_ms,
            state: None,
            input_data: None,
            output_data: None,
            error: None,
            cumulative_tokens: 0,
            cumulative_steps: 0,
            cumulative_tool_calls: 0,
            step_tokens: 0,
            trace_id: None,
            span_id: None,
            is_replay: false,
            original_execution_id: None,
            replay_from_step: None,
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input_data = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output_data = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_counters(mut self, tokens: u64, steps: u64, tool_calls: u64) -> Self {
        self.cumulative_tokens = tokens;
        self.cumulative_steps = steps;
        self.cumulative_tool_calls = tool_calls;
        self
    }

    /// Mark this event as produced by a resumed run.
    pub fn with_replay(mut self, original: ExecutionId, from_step: u64) -> Self {
        self.is_replay = true;
        self.original_execution_id = Some(original);
        self.replay_from_step = Some(from_step);
        self
    }

    /// Check that fields required by this event's type are present.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.execution_id.as_str().is_empty() {
            return Err(EventError::EmptyExecutionId);
        }

        let missing = |field| EventError::MissingField {
            event_type: self.event_type,
            field,
        };

        match self.event_type {
            EventType::StateEnter | EventType::StateExit => {
                if self.state.is_none() {
                    return Err(missing("state"));
                }
            }
            EventType::ExecutionFailed
            | EventType::PolicyViolation
            | EventType::RetryAttempted
            | EventType::ToolCallFailed
            | EventType::StepFailed
            | EventType::Error => {
                if self.error.is_none() {
                    return Err(missing("error"));
                }
            }
            EventType::ToolCallSuccess => {
                if self.input_data.is_none() {
                    return Err(missing("input_data"));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// One-line summary for logs.
    pub fn log_summary(&self) -> String {
        let t = self.event_type.as_str();
        let id = self.execution_id.short(8);
        match self.event_type {
            EventType::StateEnter | EventType::StateExit => {
                let state = self.state.map(|s| s.as_str()).unwrap_or("?");
                format!("{t} exec={id} step={} state={state}", self.step_number)
            }
            EventType::RetryAttempted | EventType::ExecutionFailed | EventType::PolicyViolation => {
                let error = self.error.as_deref().unwrap_or("");
                format!("{t} exec={id} step={} error={error}", self.step_number)
            }
            _ => format!("{t} exec={id} step={}", self.step_number),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
