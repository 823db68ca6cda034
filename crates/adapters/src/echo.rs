// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in deterministic agent.
//!
//! Plans by restating the task and executes by echoing it back. Useful
//! for wiring checks, demos, and as the registry's default entry.

use crate::agent::{AdapterError, AgentAdapter};
use crate::tool::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct EchoAgent {
    last_tokens: AtomicU64,
}

impl EchoAgent {
    pub fn new() -> Self {
        Self {
            last_tokens: AtomicU64::new(0),
        }
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentAdapter for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn plan(&self, task: &str) -> Result<String, AdapterError> {
        Ok(format!("respond to: {task}"))
    }

    async fn execute(&self, task: &str, _tools: &[Arc<dyn Tool>]) -> Result<Value, AdapterError> {
        // Rough token accounting: one token per whitespace-separated word.
        let tokens = task.split_whitespace().count() as u64;
        self.last_tokens.store(tokens, Ordering::SeqCst);
        Ok(json!({ "output": task }))
    }

    fn token_usage(&self) -> u64 {
        self.last_tokens.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "echo_tests.rs"]
mod tests;
