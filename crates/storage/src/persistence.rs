// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coarse out-of-band persistence next to the event log.
//!
//! The adapter stores the canonical execution spec (used for hash
//! integrity checks during recovery), lightweight per-step checkpoints
//! (a performance hint only — resume is always driven by event replay),
//! the set of not-yet-terminated executions, and bounded recovery
//! counters.

use crate::error::StorageError;
use async_trait::async_trait;
use fm_core::{Execution, ExecutionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serializable projection of the execution context at one step.
///
/// Live handles (agent, adapter, stores) are never serialized; callers
/// project the context onto this subset before checkpointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCheckpoint {
    pub step_number: u64,
    pub timestamp_ms: u64,
    pub state: Value,
}

/// Snapshot, active-set, and recovery-counter storage.
///
/// Safe for concurrent access from many orchestrators and workers.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Persist the canonical spec for an execution.
    async fn save_execution_spec(&self, execution: &Execution) -> Result<(), StorageError>;

    /// Load the canonical spec, if present.
    async fn load_execution_spec(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<Execution>, StorageError>;

    /// Store a step checkpoint, keyed by step for quick random access.
    async fn save_execution_step(
        &self,
        execution_id: &ExecutionId,
        checkpoint: StepCheckpoint,
    ) -> Result<(), StorageError>;

    /// Checkpoint at a specific step, if present.
    async fn get_execution_step(
        &self,
        execution_id: &ExecutionId,
        step_number: u64,
    ) -> Result<Option<StepCheckpoint>, StorageError>;

    /// All checkpoints in step order.
    async fn execution_history(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<StepCheckpoint>, StorageError>;

    /// Mark an execution as active (not yet terminated).
    async fn register_active_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<(), StorageError>;

    /// Remove an execution from the active set.
    async fn remove_active_execution(&self, execution_id: &ExecutionId)
        -> Result<(), StorageError>;

    /// Ids of all executions that have not reached a terminal status.
    async fn list_active_executions(&self) -> Result<Vec<ExecutionId>, StorageError>;

    /// Increment and return the recovery attempt counter.
    async fn increment_recovery_count(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<u32, StorageError>;

    /// Current recovery attempt counter (0 if never recovered).
    async fn get_recovery_count(&self, execution_id: &ExecutionId) -> Result<u32, StorageError>;
}
