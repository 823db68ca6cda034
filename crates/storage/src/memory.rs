// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event store and persistence adapter.
//!
//! Semantics match the Redis-backed implementations exactly; nothing here
//! survives the process. Used by tests and ephemeral single-process runs.

use crate::error::StorageError;
use crate::event_store::EventStore;
use crate::persistence::{PersistenceAdapter, StepCheckpoint};
use async_trait::async_trait;
use fm_core::{Execution, ExecutionEvent, ExecutionId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// In-memory, append-only event log.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<ExecutionId, Vec<ExecutionEvent>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: ExecutionEvent) -> Result<(), StorageError> {
        event.validate()?;

        let mut events = self.events.write();
        let log = events.entry(event.execution_id.clone()).or_default();
        log.push(event);
        // Appends are normally already monotone; stable sort keeps
        // same-step events in arrival order.
        log.sort_by_key(|e| e.step_number);
        Ok(())
    }

    async fn get(
        &self,
        execution_id: &ExecutionId,
        from_step: u64,
        to_step: Option<u64>,
    ) -> Result<Vec<ExecutionEvent>, StorageError> {
        let events = self.events.read();
        let Some(log) = events.get(execution_id) else {
            return Ok(Vec::new());
        };

        Ok(log
            .iter()
            .filter(|e| {
                e.step_number >= from_step && to_step.map_or(true, |to| e.step_number <= to)
            })
            .cloned()
            .collect())
    }

    async fn latest(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionEvent>, StorageError> {
        let events = self.events.read();
        Ok(events.get(execution_id).and_then(|log| log.last().cloned()))
    }

    async fn count(&self, execution_id: &ExecutionId) -> Result<u64, StorageError> {
        let events = self.events.read();
        Ok(events.get(execution_id).map(|log| log.len() as u64).unwrap_or(0))
    }
}

#[derive(Default)]
struct MemoryPersistenceInner {
    specs: HashMap<ExecutionId, Execution>,
    steps: HashMap<ExecutionId, Vec<StepCheckpoint>>,
    active: HashSet<ExecutionId>,
    recovery_counts: HashMap<ExecutionId, u32>,
}

/// In-memory persistence adapter.
#[derive(Default)]
pub struct MemoryPersistence {
    inner: RwLock<MemoryPersistenceInner>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryPersistence {
    async fn save_execution_spec(&self, execution: &Execution) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        inner
            .specs
            .insert(execution.execution_id.clone(), execution.clone());
        Ok(())
    }

    async fn load_execution_spec(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<Execution>, StorageError> {
        Ok(self.inner.read().specs.get(execution_id).cloned())
    }

    async fn save_execution_step(
        &self,
        execution_id: &ExecutionId,
        checkpoint: StepCheckpoint,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let steps = inner.steps.entry(execution_id.clone()).or_default();
        steps.push(checkpoint);
        steps.sort_by_key(|c| c.step_number);
        Ok(())
    }

    async fn get_execution_step(
        &self,
        execution_id: &ExecutionId,
        step_number: u64,
    ) -> Result<Option<StepCheckpoint>, StorageError> {
        Ok(self
            .inner
            .read()
            .steps
            .get(execution_id)
            .and_then(|steps| steps.iter().find(|c| c.step_number == step_number))
            .cloned())
    }

    async fn execution_history(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<StepCheckpoint>, StorageError> {
        Ok(self
            .inner
            .read()
            .steps
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn register_active_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<(), StorageError> {
        self.inner.write().active.insert(execution_id.clone());
        Ok(())
    }

    async fn remove_active_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<(), StorageError> {
        self.inner.write().active.remove(execution_id);
        Ok(())
    }

    async fn list_active_executions(&self) -> Result<Vec<ExecutionId>, StorageError> {
        Ok(self.inner.read().active.iter().cloned().collect())
    }

    async fn increment_recovery_count(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<u32, StorageError> {
        let mut inner = self.inner.write();
        let count = inner
            .recovery_counts
            .entry(execution_id.clone())
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn get_recovery_count(&self, execution_id: &ExecutionId) -> Result<u32, StorageError> {
        Ok(self
            .inner
            .read()
            .recovery_counts
            .get(execution_id)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
