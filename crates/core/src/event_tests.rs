// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state_machine::LifecycleState;
use serde_json::json;
use yare::parameterized;

fn event(event_type: EventType) -> ExecutionEvent {
    ExecutionEvent::new(ExecutionId::new("exec-1"), 0, event_type, 1_000_000)
}

// ── Validation ───────────────────────────────────────────────────────────────

#[test]
fn empty_execution_id_rejected() {
    let ev = ExecutionEvent::new(ExecutionId::new(""), 0, EventType::ExecutionStarted, 0);
    assert_eq!(ev.validate(), Err(EventError::EmptyExecutionId));
}

#[test]
fn state_enter_requires_state() {
    let ev = event(EventType::StateEnter);
    assert!(matches!(
        ev.validate(),
        Err(EventError::MissingField { field: "state", .. })
    ));

    let ev = event(EventType::StateEnter).with_state(LifecycleState::Init);
    assert!(ev.validate().is_ok());
}

#[parameterized(
    execution_failed = { EventType::ExecutionFailed },
    policy_violation = { EventType::PolicyViolation },
    retry_attempted = { EventType::RetryAttempted },
    tool_call_failed = { EventType::ToolCallFailed },
    step_failed = { EventType::StepFailed },
    error = { EventType::Error },
)]
fn error_bearing_events_require_error(event_type: EventType) {
    let ev = event(event_type);
    assert!(matches!(
        ev.validate(),
        Err(EventError::MissingField { field: "error", .. })
    ));

    let ev = event(event_type).with_error("boom");
    assert!(ev.validate().is_ok());
}

#[test]
fn tool_call_success_requires_input() {
    let ev = event(EventType::ToolCallSuccess);
    assert!(ev.validate().is_err());

    let ev = event(EventType::ToolCallSuccess).with_input(json!({"tool_hash": "abc"}));
    assert!(ev.validate().is_ok());
}

#[test]
fn plain_events_validate_without_payload() {
    assert!(event(EventType::ExecutionStarted).validate().is_ok());
    assert!(event(EventType::ToolCall).validate().is_ok());
    assert!(event(EventType::IdempotentToolSkipped).validate().is_ok());
}

// ── Terminality ──────────────────────────────────────────────────────────────

#[parameterized(
    completed = { EventType::ExecutionCompleted, true },
    failed = { EventType::ExecutionFailed, true },
    policy = { EventType::PolicyViolation, true },
    state_enter = { EventType::StateEnter, false },
    retry = { EventType::RetryAttempted, false },
)]
fn terminal_types(event_type: EventType, expected: bool) {
    assert_eq!(event_type.is_terminal(), expected);
}

// ── Serialization ────────────────────────────────────────────────────────────

#[test]
fn event_type_uses_wire_names() {
    assert_eq!(
        serde_json::to_string(&EventType::IdempotentToolSkipped).unwrap(),
        "\"IDEMPOTENT_TOOL_SKIPPED\""
    );
    assert_eq!(EventType::TokenBudgetExceeded.as_str(), "TOKEN_BUDGET_EXCEEDED");
}

#[test]
fn event_roundtrips_through_json() {
    let ev = event(EventType::StateEnter)
        .with_state(LifecycleState::Execute)
        .with_counters(120, 2, 1)
        .with_input(json!({"task": "demo"}))
        .with_replay(ExecutionId::new("exec-1"), 2);

    let json = serde_json::to_string(&ev).unwrap();
    let back: ExecutionEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ev);
}

#[test]
fn optional_fields_are_omitted_when_empty() {
    let json = serde_json::to_value(event(EventType::ExecutionStarted)).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("state"));
    assert!(!obj.contains_key("error"));
    assert!(!obj.contains_key("is_replay"));
    assert!(!obj.contains_key("original_execution_id"));
}

#[test]
fn missing_counters_default_to_zero() {
    let json = r#"{
        "execution_id": "exec-1",
        "step_number": 3,
        "event_type": "STATE_ENTER",
        "timestamp_ms": 5,
        "state": "PLAN"
    }"#;
    let ev: ExecutionEvent = serde_json::from_str(json).unwrap();
    assert_eq!(ev.cumulative_tokens, 0);
    assert_eq!(ev.cumulative_tool_calls, 0);
    assert!(!ev.is_replay);
}

// ── Log summary ──────────────────────────────────────────────────────────────

#[test]
fn log_summary_includes_state() {
    let ev = event(EventType::StateEnter).with_state(LifecycleState::Plan);
    let summary = ev.log_summary();
    assert!(summary.contains("STATE_ENTER"));
    assert!(summary.contains("state=PLAN"));
}

#[test]
fn log_summary_includes_error() {
    let ev = event(EventType::ExecutionFailed).with_error("adapter exploded");
    assert!(ev.log_summary().contains("adapter exploded"));
}
