// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution identity, immutable configuration snapshots, and content
//! hashing.
//!
//! An execution is bound at creation to an [`ExecutionSnapshot`] and a
//! derived content hash. The snapshot never changes; all runtime state is
//! derived from the event log.

use crate::clock::Clock;
use crate::hashing::content_hash;
use crate::id::{IdGen, UuidIdGen};
use crate::policy::Policy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

crate::define_id! {
    /// Opaque, collision-resistant identifier for one execution.
    #[derive(Default)]
    pub struct ExecutionId;
}

/// Runtime version pinned into snapshots for hash stability.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lifecycle status of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    PolicyViolated,
}

/// Name and description of a tool exposed to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Immutable configuration of an execution.
///
/// Canonical serialization sorts all mappings by key before hashing, so the
/// hash is a pure function of the fields and is reproducible across
/// processes of the same runtime version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub task: String,
    #[serde(default)]
    pub policy_config: IndexMap<String, Value>,
    #[serde(default)]
    pub agent_config: IndexMap<String, Value>,
    #[serde(default)]
    pub tool_config: Vec<ToolDescriptor>,
    pub runtime_version: String,
}

impl ExecutionSnapshot {
    pub fn new(
        task: impl Into<String>,
        policy: &Policy,
        agent_name: impl Into<String>,
        tools: Vec<ToolDescriptor>,
    ) -> Self {
        let mut agent_config = IndexMap::new();
        agent_config.insert("name".to_string(), Value::String(agent_name.into()));

        Self {
            task: task.into(),
            policy_config: policy.config_map(),
            agent_config,
            tool_config: tools,
            runtime_version: RUNTIME_VERSION.to_string(),
        }
    }

    /// 32-byte content digest (hex) over the canonicalized fields.
    pub fn content_hash(&self) -> String {
        let tools: Vec<Value> = self
            .tool_config
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description}))
            .collect();

        let data = json!({
            "task": self.task,
            "policy": self.policy_config,
            "agent": self.agent_config,
            "tools": tools,
            "version": self.runtime_version,
        });
        content_hash(&data)
    }

    /// Agent name recorded in the snapshot, if any.
    pub fn agent_name(&self) -> Option<&str> {
        self.agent_config.get("name").and_then(Value::as_str)
    }
}

/// Canonical record of one execution: identity, content hash, snapshot.
///
/// Runtime metrics (steps, tokens, tool calls) are derived from the event
/// log and never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: ExecutionId,
    pub execution_hash: String,
    pub snapshot: ExecutionSnapshot,
    pub status: ExecutionStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Execution {
    /// Bind a snapshot to a new (or supplied) execution id and compute the
    /// content hash once.
    pub fn new(
        snapshot: ExecutionSnapshot,
        execution_id: Option<ExecutionId>,
        clock: &dyn Clock,
    ) -> Self {
        let execution_id = execution_id.unwrap_or_else(|| ExecutionId::new(UuidIdGen.next()));
        let execution_hash = snapshot.content_hash();
        let now = clock.epoch_ms();

        Self {
            execution_id,
            execution_hash,
            snapshot,
            status: ExecutionStatus::Pending,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// Re-derive the hash from the stored snapshot and compare.
    ///
    /// A mismatch means the persisted record was corrupted or tampered with;
    /// recovery refuses to resume such executions.
    pub fn validate_hash(&self) -> bool {
        self.snapshot.content_hash() == self.execution_hash
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
