// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::LifecycleState;

fn context() -> ExecutionContext {
    ExecutionContext::new(ExecutionId::new("exec-1"), "hash-1", "my task")
}

#[test]
fn starts_zeroed() {
    let ctx = context();
    assert_eq!(ctx.step_count, 0);
    assert_eq!(ctx.token_usage, 0);
    assert_eq!(ctx.tool_calls, 0);
    assert!(ctx.plan.is_none());
    assert!(ctx.final_output.is_none());
}

#[test]
fn policy_context_mirrors_counters() {
    let mut ctx = context();
    ctx.step_count = 3;
    ctx.token_usage = 500;
    ctx.tool_calls = 2;

    let policy_ctx = ctx.policy_context();
    assert_eq!(policy_ctx.step_count, 3);
    assert_eq!(policy_ctx.token_usage, 500);
    assert_eq!(policy_ctx.tool_calls, 2);
}

#[test]
fn hydrate_restores_replayed_state() {
    let mut ctx = context();
    ctx.hydrate(&ExecutionState {
        execution_id: ExecutionId::new("exec-1"),
        current_step: 2,
        cumulative_tokens: 300,
        cumulative_tool_calls: 1,
        current_state: Some(LifecycleState::Execute),
        last_output: Some(json!({"output": "partial"})),
        error: None,
    });

    assert_eq!(ctx.step_count, 2);
    assert_eq!(ctx.token_usage, 300);
    assert_eq!(ctx.tool_calls, 1);
    assert_eq!(ctx.execution_result, Some(json!({"output": "partial"})));
}

#[test]
fn hydrate_without_output_keeps_none() {
    let mut ctx = context();
    ctx.hydrate(&ExecutionState {
        execution_id: ExecutionId::new("exec-1"),
        current_step: 1,
        cumulative_tokens: 0,
        cumulative_tool_calls: 0,
        current_state: None,
        last_output: None,
        error: None,
    });
    assert!(ctx.execution_result.is_none());
}

#[test]
fn safe_snapshot_is_pure_data() {
    let mut ctx = context();
    ctx.plan = Some("the plan".to_string());
    ctx.step_count = 2;

    let snapshot = ctx.safe_snapshot();
    assert_eq!(snapshot["execution_id"], "exec-1");
    assert_eq!(snapshot["task"], "my task");
    assert_eq!(snapshot["plan"], "the plan");
    assert_eq!(snapshot["step_count"], 2);
    // Round-trips through JSON without loss.
    let text = serde_json::to_string(&snapshot).unwrap();
    let back: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(back, snapshot);
}
