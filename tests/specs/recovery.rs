// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery manager scenarios: resuming an orphaned execution end to end
//! and refusing corrupted snapshots.

use super::prelude::*;
use fm_adapters::{AdapterError, AgentAdapter, AgentRegistry, ScriptedAgent};
use fm_core::{EventType, Policy, ReportStatus, RetryConfig};
use fm_engine::{RecoveryManager, RunOptions};
use fm_storage::{EventStore, PersistenceAdapter};
use std::sync::Arc;

fn registry() -> AgentRegistry {
    let mut registry = AgentRegistry::with_defaults();
    registry.register("scripted", || {
        Arc::new(ScriptedAgent::new()) as Arc<dyn AgentAdapter>
    });
    registry
}

#[tokio::test]
async fn orphaned_execution_is_resumed_to_completion() {
    let rt = runtime(Policy::new().with_retry(RetryConfig::none()));

    // A run crashes mid-EXECUTE, leaving the execution in the active set.
    // (Simulated by re-registering it after the failed run removed it —
    // a real crash would never reach the cleanup.)
    let crashing = Arc::new(ScriptedAgent::named("scripted").always_fail(
        AdapterError::Unavailable("power loss".into()),
    ));
    let report = rt.orchestrator.run(crashing, "recover me").await;
    rt.persistence
        .register_active_execution(&report.execution_id)
        .await
        .unwrap();

    let manager = RecoveryManager::new(
        rt.event_store.clone() as Arc<dyn EventStore>,
        rt.persistence.clone() as Arc<dyn PersistenceAdapter>,
        registry(),
    );

    let mut recovered = manager.recover_executions().await;
    assert_eq!(recovered.len(), 1);

    let resumed = recovered.remove(0);
    let resumed_report = resumed.handle.await.unwrap();
    assert_eq!(resumed_report.status, ReportStatus::Success);

    // The resumed run produced the single EXECUTION_COMPLETED event.
    let events = rt
        .event_store
        .get(&report.execution_id, 0, None)
        .await
        .unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == EventType::ExecutionCompleted)
            .count(),
        1
    );
    assert!(rt
        .persistence
        .list_active_executions()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn recovery_refuses_tampered_snapshots() {
    let rt = runtime(Policy::new().with_retry(RetryConfig::none()));

    let crashing = Arc::new(ScriptedAgent::named("scripted").always_fail(
        AdapterError::Unavailable("crash".into()),
    ));
    let report = rt.orchestrator.run(crashing, "original task").await;
    rt.persistence
        .register_active_execution(&report.execution_id)
        .await
        .unwrap();

    // Corrupt the stored snapshot.
    let mut execution = rt
        .persistence
        .load_execution_spec(&report.execution_id)
        .await
        .unwrap()
        .unwrap();
    execution.snapshot.task = "not the original task".into();
    rt.persistence.save_execution_spec(&execution).await.unwrap();

    let manager = RecoveryManager::new(
        rt.event_store.clone() as Arc<dyn EventStore>,
        rt.persistence.clone() as Arc<dyn PersistenceAdapter>,
        registry(),
    );

    assert!(manager.recover_executions().await.is_empty());
    // Dropped from the active set and never resumed.
    assert!(rt
        .persistence
        .list_active_executions()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn replay_to_state_matches_orchestrator_checkpoint() {
    let rt = runtime(Policy::new().with_retry(RetryConfig::none()));
    let report = rt
        .orchestrator
        .run_with(
            Arc::new(ScriptedAgent::new().with_tokens_per_execute(120)),
            "checkpoint parity",
            RunOptions::default(),
        )
        .await;

    // Fold the log up to the REVIEW checkpoint and compare with the
    // counters that STATE_ENTER recorded.
    let events = rt
        .event_store
        .get(&report.execution_id, 0, None)
        .await
        .unwrap();
    let review_enter = events
        .iter()
        .find(|e| {
            e.event_type == EventType::StateEnter
                && e.state == Some(fm_core::LifecycleState::Review)
        })
        .unwrap();

    let state = rt
        .event_store
        .replay_to_state(&report.execution_id, Some(review_enter.step_number))
        .await
        .unwrap();

    assert_eq!(state.current_step, review_enter.step_number);
    assert_eq!(state.cumulative_tokens, review_enter.cumulative_tokens);
    assert_eq!(
        state.cumulative_tool_calls,
        review_enter.cumulative_tool_calls
    );
    assert_eq!(state.current_state, Some(fm_core::LifecycleState::Review));
}
