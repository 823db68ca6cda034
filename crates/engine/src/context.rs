// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable per-run execution context.
//!
//! The context carries only serializable data; live handles (agent,
//! stores, bus) stay on the orchestrator. It is shared between the
//! lifecycle loop and the idempotent tool wrapper, which both update the
//! counters.

use fm_core::{ExecutionId, PolicyContext};
use fm_storage::ExecutionState;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// In-memory working state of one orchestrator run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub execution_hash: String,
    pub task: String,
    pub plan: Option<String>,
    pub execution_result: Option<Value>,
    pub final_output: Option<String>,
    pub step_count: u64,
    pub token_usage: u64,
    pub tool_calls: u64,
}

/// Context handle shared between the loop and wrapped tools.
pub type SharedContext = Arc<Mutex<ExecutionContext>>;

impl ExecutionContext {
    pub fn new(
        execution_id: ExecutionId,
        execution_hash: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            execution_hash: execution_hash.into(),
            task: task.into(),
            plan: None,
            execution_result: None,
            final_output: None,
            step_count: 0,
            token_usage: 0,
            tool_calls: 0,
        }
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Counters as seen by policy validation.
    pub fn policy_context(&self) -> PolicyContext {
        PolicyContext {
            step_count: self.step_count,
            token_usage: self.token_usage,
            tool_calls: self.tool_calls,
        }
    }

    /// Hydrate counters and last output from replayed state.
    pub fn hydrate(&mut self, state: &ExecutionState) {
        self.step_count = state.current_step;
        self.token_usage = state.cumulative_tokens;
        self.tool_calls = state.cumulative_tool_calls;
        if let Some(output) = &state.last_output {
            self.execution_result = Some(output.clone());
        }
    }

    /// Projection onto the serializable subset, for step checkpoints.
    pub fn safe_snapshot(&self) -> Value {
        json!({
            "execution_id": self.execution_id,
            "execution_hash": self.execution_hash,
            "task": self.task,
            "plan": self.plan,
            "final_output": self.final_output,
            "step_count": self.step_count,
            "token_usage": self.token_usage,
            "tool_calls": self.tool_calls,
        })
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
