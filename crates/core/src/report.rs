// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Final report returned for every finished execution.

use crate::execution::ExecutionId;
use crate::state_machine::LifecycleState;
use serde::{Deserialize, Serialize};

/// Outcome of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Success,
    Failed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Success => write!(f, "SUCCESS"),
            ReportStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Summary of one end-to-end drive of an agent through the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: ExecutionId,
    pub agent_name: String,
    pub status: ReportStatus,
    pub total_tokens: u64,
    pub total_steps: u64,
    pub tool_calls: u64,
    pub elapsed_seconds: f64,
    pub state_history: Vec<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    pub timestamp_ms: u64,
    pub execution_hash: String,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status == ReportStatus::Success
    }
}
