// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: scan the active set, validate integrity, resume.
//!
//! Recovery is best-effort and idempotent — event appends are
//! append-only and tool calls deduplicate, so repeated passes converging
//! on the same terminal state are safe. Each execution gets at most
//! [`MAX_RECOVERY_ATTEMPTS`] tries before it is dropped from the active
//! set.

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::orchestrator::{Orchestrator, RunOptions};
use fm_adapters::AgentRegistry;
use fm_core::{ExecutionId, ExecutionReport, Policy};
use fm_storage::{EventStore, PersistenceAdapter};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Recovery attempts allowed per execution.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// A resumed execution running as a background task.
pub struct RecoveredExecution {
    pub execution_id: ExecutionId,
    pub from_step: u64,
    pub handle: JoinHandle<ExecutionReport>,
}

/// Scans for orphaned executions and relaunches them through the
/// orchestrator's replay path.
pub struct RecoveryManager {
    event_store: Arc<dyn EventStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    registry: AgentRegistry,
}

impl RecoveryManager {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        persistence: Arc<dyn PersistenceAdapter>,
        registry: AgentRegistry,
    ) -> Self {
        Self {
            event_store,
            persistence,
            registry,
        }
    }

    /// One recovery pass over the active set.
    ///
    /// Returns handles for every execution actually resumed; failures are
    /// logged and skipped.
    pub async fn recover_executions(&self) -> Vec<RecoveredExecution> {
        let active = match self.persistence.list_active_executions().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to list active executions");
                return Vec::new();
            }
        };

        if active.is_empty() {
            info!("no active executions found for recovery");
            return Vec::new();
        }

        info!(count = active.len(), "checking active executions for recovery");

        let mut resumed = Vec::new();
        for execution_id in active {
            match self.recover_one(&execution_id).await {
                Ok(Some(recovered)) => resumed.push(recovered),
                Ok(None) => {}
                Err(err) => {
                    error!(execution_id = %execution_id, error = %err, "failed to recover execution");
                }
            }
        }
        resumed
    }

    async fn recover_one(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<RecoveredExecution>, EngineError> {
        // 1. Bounded attempts.
        let attempts = self.persistence.get_recovery_count(execution_id).await?;
        if attempts >= MAX_RECOVERY_ATTEMPTS {
            error!(
                execution_id = %execution_id,
                attempts,
                "exceeded max recovery attempts, dropping from active set",
            );
            self.persistence.remove_active_execution(execution_id).await?;
            return Ok(None);
        }
        self.persistence.increment_recovery_count(execution_id).await?;

        // 2. The spec must exist.
        let Some(execution) = self.persistence.load_execution_spec(execution_id).await? else {
            warn!(execution_id = %execution_id, "no execution spec found, skipping recovery");
            self.persistence.remove_active_execution(execution_id).await?;
            return Ok(None);
        };

        // 3. Hash integrity: refuse to resume suspected corruption.
        if !execution.validate_hash() {
            error!(
                execution_id = %execution_id,
                stored_hash = %execution.execution_hash,
                "snapshot hash mismatch, suspected corruption",
            );
            self.persistence.remove_active_execution(execution_id).await?;
            return Ok(None);
        }

        // 4. Rebuild policy and agent from the snapshot.
        let policy = Policy::from_config_map(&execution.snapshot.policy_config);
        let agent_name = execution.snapshot.agent_name().unwrap_or("echo").to_string();
        let agent = self.registry.create(&agent_name)?;

        // 5. Resume from the last observed step as a background task.
        let from_step = self
            .event_store
            .latest(execution_id)
            .await?
            .map(|event| event.step_number)
            .unwrap_or(0);

        info!(
            execution_id = %execution_id,
            from_step,
            attempt = attempts + 1,
            "resuming execution",
        );

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.event_store),
            Arc::clone(&self.persistence),
            policy,
        );
        let task = execution.snapshot.task.clone();
        let opts = RunOptions::resume(execution_id.clone(), from_step)
            .with_cancel(CancelToken::new());

        let handle = tokio::spawn(async move { orchestrator.run_with(agent, &task, opts).await });

        Ok(Some(RecoveredExecution {
            execution_id: execution_id.clone(),
            from_step,
            handle,
        }))
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
