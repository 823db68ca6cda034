// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent interface.
//!
//! The orchestrator drives agents exclusively through this trait:
//! `plan` translates a task into an executable plan, `execute` runs it
//! (with access to the wrapped tool set), and `token_usage` reports the
//! tokens consumed by the most recent execute call.

use crate::tool::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Faults raised by an agent adapter.
///
/// The `kind` string is what retry configuration matches against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Backend temporarily unreachable; retryable.
    #[error("agent unavailable: {0}")]
    Unavailable(String),
    /// Rate limited by the backing service; retryable.
    #[error("agent rate limited")]
    RateLimited,
    /// The request itself is malformed; retrying cannot help.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),
    /// No adapter registered under the requested name.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    /// Any other failure surfaced by the agent.
    #[error("agent failure: {0}")]
    Failed(String),
}

impl AdapterError {
    /// Stable kind name for retry matching.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Unavailable(_) => "unavailable",
            AdapterError::RateLimited => "rate_limited",
            AdapterError::InvalidRequest(_) => "invalid_request",
            AdapterError::UnknownAgent(_) => "unknown_agent",
            AdapterError::Failed(_) => "failed",
        }
    }
}

/// An opaque agent, polymorphic over `{plan, execute, token_usage}`.
///
/// Implementations must be safe to share across tasks; any mutable
/// bookkeeping (token counters, recorded calls) lives behind interior
/// mutability.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Stable identity recorded in snapshots.
    fn name(&self) -> &str;

    /// Tools this agent may call during execute.
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    /// Translate the task into a plan.
    async fn plan(&self, task: &str) -> Result<String, AdapterError>;

    /// Run the plan. `tools` is the (already wrapped) tool set the agent
    /// may invoke.
    async fn execute(&self, task: &str, tools: &[Arc<dyn Tool>]) -> Result<Value, AdapterError>;

    /// Tokens consumed by the most recent `execute` call.
    fn token_usage(&self) -> u64;
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
