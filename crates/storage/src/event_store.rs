// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log, keyed by execution, with replay-to-state.
//!
//! The log is conceptually a sorted map `(execution_id, step_number)` →
//! event. Appends reject invalid events; reads always come back in
//! ascending `step_number`. Folding the log produces the
//! [`ExecutionState`] that resume and recovery operate on.

use crate::error::StorageError;
use async_trait::async_trait;
use fm_core::{EventType, ExecutionEvent, ExecutionId, ExecutionStatus, LifecycleState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event retention: 7 days.
pub const RETENTION_SECS: usize = 604_800;

/// State reconstructed by folding an execution's event log.
///
/// This — not any mutable in-memory object — is the source of truth a
/// resumed run starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub execution_id: ExecutionId,
    pub current_step: u64,
    pub cumulative_tokens: u64,
    pub cumulative_tool_calls: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionState {
    fn empty(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            current_step: 0,
            cumulative_tokens: 0,
            cumulative_tool_calls: 0,
            current_state: None,
            last_output: None,
            error: None,
        }
    }

    /// Fold one event into the state.
    fn apply(&mut self, event: &ExecutionEvent) {
        self.current_step = event.step_number;
        self.cumulative_tokens = event.cumulative_tokens;
        self.cumulative_tool_calls = event.cumulative_tool_calls;

        if event.event_type == EventType::StateEnter {
            self.current_state = event.state;
        }
        if let Some(output) = &event.output_data {
            self.last_output = Some(output.clone());
        }
        if let Some(error) = &event.error {
            self.error = Some(error.clone());
        }
    }
}

/// One row of a timeline view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub step: u64,
    pub event_type: EventType,
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
    pub cumulative_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Derived view of an execution's history, for auditing and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTimeline {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub total_events: usize,
    pub entries: Vec<TimelineEntry>,
}

/// Append-only event persistence.
///
/// Implementations must guarantee append-only writes, ordering
/// preservation, and efficient range reads. Safe for concurrent use from
/// many orchestrators; each execution writes its own partition.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a validated event to its execution's log.
    async fn append(&self, event: ExecutionEvent) -> Result<(), StorageError>;

    /// Events for an execution with `from_step ≤ step_number ≤ to_step`
    /// (`to_step = None` reads to the end), ascending by step.
    async fn get(
        &self,
        execution_id: &ExecutionId,
        from_step: u64,
        to_step: Option<u64>,
    ) -> Result<Vec<ExecutionEvent>, StorageError>;

    /// The most recent event, if any.
    async fn latest(&self, execution_id: &ExecutionId)
        -> Result<Option<ExecutionEvent>, StorageError>;

    /// Total number of events for an execution.
    async fn count(&self, execution_id: &ExecutionId) -> Result<u64, StorageError>;

    /// Reconstruct execution state by folding events up to `target_step`
    /// (inclusive; `None` replays everything).
    async fn replay_to_state(
        &self,
        execution_id: &ExecutionId,
        target_step: Option<u64>,
    ) -> Result<ExecutionState, StorageError> {
        let events = self.get(execution_id, 0, target_step).await?;

        let mut state = ExecutionState::empty(execution_id.clone());
        for event in &events {
            state.apply(event);
        }
        Ok(state)
    }

    /// Timeline view of the full log, with a status derived from the last
    /// event.
    async fn timeline(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<ExecutionTimeline, StorageError> {
        let events = self.get(execution_id, 0, None).await?;

        let status = match events.last().map(|e| e.event_type) {
            None => ExecutionStatus::Pending,
            Some(EventType::ExecutionCompleted) => ExecutionStatus::Completed,
            Some(EventType::ExecutionFailed) => ExecutionStatus::Failed,
            Some(EventType::PolicyViolation) => ExecutionStatus::PolicyViolated,
            Some(_) => ExecutionStatus::Running,
        };

        let entries = events
            .iter()
            .map(|e| TimelineEntry {
                step: e.step_number,
                event_type: e.event_type,
                timestamp_ms: e.timestamp_ms,
                state: e.state,
                cumulative_tokens: e.cumulative_tokens,
                error: e.error.clone(),
            })
            .collect();

        Ok(ExecutionTimeline {
            execution_id: execution_id.clone(),
            status,
            total_events: events.len(),
            entries,
        })
    }
}
