// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use fm_adapters::AdapterError;
use fm_core::{ExecutionId, InvalidStateTransition, PolicyViolation};
use fm_storage::StorageError;
use thiserror::Error;

/// Everything that can abort an orchestrator run.
///
/// Exactly one terminating event is appended per run: `POLICY_VIOLATION`
/// for [`EngineError::Policy`], `EXECUTION_FAILED` for everything else.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A budget tripped. Never retried.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    /// Programmer error in lifecycle handling; fatal to the run.
    #[error(transparent)]
    Transition(#[from] InvalidStateTransition),
    /// Fault raised by the external agent; retried per policy first.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// Event-store or persistence failure that survived bounded retries.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Snapshot hash mismatch during recovery; never resumed.
    #[error("snapshot integrity check failed for execution {0}")]
    Integrity(ExecutionId),
    /// External cancellation of an async run.
    #[error("execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// Stable kind name, used by retry matching and failure accounting.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Policy(_) => "policy",
            EngineError::Transition(_) => "transition",
            EngineError::Adapter(e) => e.kind(),
            EngineError::Storage(_) => "storage",
            EngineError::Integrity(_) => "integrity",
            EngineError::Cancelled => "cancelled",
        }
    }
}
