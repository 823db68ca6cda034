// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-execution lifecycle scenarios: happy path, budget enforcement,
//! retry exhaustion, crash/resume, and idempotent tools.

use super::prelude::*;
use async_trait::async_trait;
use fm_adapters::{AdapterError, ScriptedAgent, Tool, ToolError};
use fm_core::{
    BackoffStrategy, EventType, ExecutionId, LifecycleState, Policy, ReportStatus, RetryConfig,
};
use fm_engine::RunOptions;
use fm_storage::EventStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn policy() -> Policy {
    Policy::new()
        .with_max_steps(5)
        .with_max_tokens(1_000)
        .with_retry(RetryConfig::none())
}

#[tokio::test]
async fn happy_path_produces_success_report_and_clean_log() {
    let rt = runtime(policy());
    let agent = Arc::new(ScriptedAgent::new());

    let report = rt.orchestrator.run(agent, "summarize the findings").await;

    assert_eq!(report.status, ReportStatus::Success);
    assert!(report.total_steps >= 3);
    assert_eq!(report.final_output.as_deref(), Some("ok"));

    let events = rt
        .event_store
        .get(&report.execution_id, 0, None)
        .await
        .unwrap();
    assert_eq!(
        events.last().unwrap().event_type,
        EventType::ExecutionCompleted
    );
    // Counters are monotone across the whole log.
    for pair in events.windows(2) {
        assert!(pair[0].step_number <= pair[1].step_number);
        assert!(pair[0].cumulative_tokens <= pair[1].cumulative_tokens);
    }
}

#[tokio::test]
async fn step_budget_of_one_fails_with_policy_violation() {
    let rt = runtime(
        Policy::new()
            .with_max_steps(1)
            .with_retry(RetryConfig::none()),
    );
    let report = rt
        .orchestrator
        .run(Arc::new(ScriptedAgent::new()), "too many steps")
        .await;

    assert_eq!(report.status, ReportStatus::Failed);

    let events = rt
        .event_store
        .get(&report.execution_id, 0, None)
        .await
        .unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::PolicyViolation);
    assert!(last.error.as_ref().unwrap().contains("steps"));
    assert!(!events
        .iter()
        .any(|e| e.event_type == EventType::ExecutionCompleted));
}

#[tokio::test]
async fn retry_exhaustion_invokes_adapter_three_times() {
    let retry = RetryConfig {
        max_retries: 2,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_factor: 2.0,
        strategy: BackoffStrategy::Exponential,
        retryable_errors: Vec::new(),
        non_retryable_errors: Vec::new(),
    };
    let rt = runtime(Policy::new().with_retry(retry));
    let agent = Arc::new(
        ScriptedAgent::new().always_fail(AdapterError::Unavailable("flaky backend".into())),
    );

    let report = rt.orchestrator.run(agent.clone(), "never works").await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(agent.execute_count(), 3);

    let events = rt
        .event_store
        .get(&report.execution_id, 0, None)
        .await
        .unwrap();
    let retries = events
        .iter()
        .filter(|e| e.event_type == EventType::RetryAttempted)
        .count();
    assert_eq!(retries, 2);
    assert_eq!(
        events.last().unwrap().event_type,
        EventType::ExecutionFailed
    );
}

#[tokio::test]
async fn crash_and_resume_completes_exactly_once() {
    let rt = runtime(policy());
    let execution_id = ExecutionId::new("spec-resume");

    // The first run dies in EXECUTE.
    let crashing = Arc::new(
        ScriptedAgent::new().always_fail(AdapterError::Unavailable("process died".into())),
    );
    let opts = RunOptions {
        execution_id: Some(execution_id.clone()),
        ..RunOptions::default()
    };
    rt.orchestrator.run_with(crashing, "finish the job", opts).await;

    let from_step = rt
        .event_store
        .latest(&execution_id)
        .await
        .unwrap()
        .unwrap()
        .step_number;

    // Resume against a healthy agent.
    let report = rt
        .orchestrator
        .run_with(
            Arc::new(ScriptedAgent::new()),
            "finish the job",
            RunOptions::resume(execution_id.clone(), from_step),
        )
        .await;

    assert_eq!(report.status, ReportStatus::Success);
    // Post-resume states appear exactly once.
    assert_eq!(
        report.state_history,
        vec![
            LifecycleState::Init,
            LifecycleState::Execute,
            LifecycleState::Review,
            LifecycleState::Terminate,
        ]
    );

    let events = rt.event_store.get(&execution_id, 0, None).await.unwrap();
    let completed = events
        .iter()
        .filter(|e| e.event_type == EventType::ExecutionCompleted)
        .count();
    assert_eq!(completed, 1);
}

/// Side-effectful tool that counts how many times it actually ran.
struct Doubler {
    invocations: AtomicU32,
}

#[async_trait]
impl Tool for Doubler {
    fn name(&self) -> &str {
        "double"
    }

    fn description(&self) -> &str {
        "doubles a number"
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let n = args
            .get("n")
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::Failed("missing n".into()))?;
        Ok(json!(n * 2))
    }
}

#[tokio::test]
async fn idempotent_tool_survives_crash_resume() {
    let rt = runtime(policy());
    let execution_id = ExecutionId::new("spec-idempotent");
    let doubler = Arc::new(Doubler {
        invocations: AtomicU32::new(0),
    });

    // First run: the agent calls double(5), then the execute fails.
    let crashing = ScriptedAgent::new()
        .with_tools(vec![doubler.clone() as Arc<dyn Tool>])
        .with_tool_call("double", json!({"n": 5}))
        .fail_times(1, AdapterError::Unavailable("crash after tool call".into()));
    let opts = RunOptions {
        execution_id: Some(execution_id.clone()),
        ..RunOptions::default()
    };
    let first = rt
        .orchestrator
        .run_with(Arc::new(crashing), "double five", opts)
        .await;
    assert_eq!(first.status, ReportStatus::Failed);
    assert_eq!(doubler.invocations.load(Ordering::SeqCst), 1);

    // Resume: the same tool call is replayed from the log, not re-run.
    let from_step = rt
        .event_store
        .latest(&execution_id)
        .await
        .unwrap()
        .unwrap()
        .step_number;
    let resumed = ScriptedAgent::new()
        .with_tools(vec![doubler.clone() as Arc<dyn Tool>])
        .with_tool_call("double", json!({"n": 5}));
    let report = rt
        .orchestrator
        .run_with(
            Arc::new(resumed),
            "double five",
            RunOptions::resume(execution_id.clone(), from_step),
        )
        .await;

    assert_eq!(report.status, ReportStatus::Success);
    // Both runs observed 10, but the side effect ran once.
    assert_eq!(report.final_output.as_deref(), Some("10"));
    assert_eq!(doubler.invocations.load(Ordering::SeqCst), 1);

    let events = rt.event_store.get(&execution_id, 0, None).await.unwrap();
    let successes = events
        .iter()
        .filter(|e| e.event_type == EventType::ToolCallSuccess)
        .count();
    let skips = events
        .iter()
        .filter(|e| e.event_type == EventType::IdempotentToolSkipped)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(skips, 1);
}
