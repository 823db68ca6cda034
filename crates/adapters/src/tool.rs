// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callable tools exposed to agents.
//!
//! The engine wraps every tool in an idempotency layer before handing it
//! to an agent, so implementations here only describe the raw side effect.

use async_trait::async_trait;
use fm_core::{PolicyViolation, ToolDescriptor};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failures surfaced by a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A budget tripped during the pre-invocation policy check.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    /// The event log could not be read or written.
    #[error("tool storage error: {0}")]
    Storage(String),
    /// The tool itself failed.
    #[error("tool failed: {0}")]
    Failed(String),
}

/// A side-effectful operation callable by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

/// Descriptors for a tool set, in declaration order.
pub fn descriptors(tools: &[Arc<dyn Tool>]) -> Vec<ToolDescriptor> {
    tools
        .iter()
        .map(|t| ToolDescriptor::new(t.name(), t.description()))
        .collect()
}
