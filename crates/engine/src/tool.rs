// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent tool wrapper.
//!
//! Every tool handed to an agent goes through this wrapper. A call is
//! keyed by the content hash of `{name, args}`; if the execution's event
//! log already holds a `TOOL_CALL_SUCCESS` with the same key, the stored
//! result is returned without re-invoking the tool. This gives at-most-once
//! observable side effects for identical invocations across crash-resume
//! cycles — the event log itself is the deduplication index.

use crate::bus::EventBus;
use crate::context::SharedContext;
use async_trait::async_trait;
use fm_adapters::{Tool, ToolError};
use fm_core::{canonical_json, Clock, EventType, ExecutionEvent, Policy};
use fm_storage::{EventStore, StorageError};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Deduplication key for one tool invocation.
pub fn tool_call_hash(name: &str, args: &Value) -> String {
    let canonical = canonical_json(&json!({ "name": name, "args": args }));
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

/// A [`Tool`] wrapped with event logging, policy enforcement, and
/// idempotent replay.
pub struct IdempotentTool {
    inner: Arc<dyn Tool>,
    event_store: Arc<dyn EventStore>,
    ctx: SharedContext,
    policy: Policy,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl IdempotentTool {
    pub fn new(
        inner: Arc<dyn Tool>,
        event_store: Arc<dyn EventStore>,
        ctx: SharedContext,
        policy: Policy,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            event_store,
            ctx,
            policy,
            bus,
            clock,
        }
    }

    /// Wrap a whole tool set for one execution.
    pub fn wrap_all(
        tools: Vec<Arc<dyn Tool>>,
        event_store: &Arc<dyn EventStore>,
        ctx: &SharedContext,
        policy: &Policy,
        bus: &EventBus,
        clock: &Arc<dyn Clock>,
    ) -> Vec<Arc<dyn Tool>> {
        tools
            .into_iter()
            .map(|tool| {
                Arc::new(IdempotentTool::new(
                    tool,
                    Arc::clone(event_store),
                    Arc::clone(ctx),
                    policy.clone(),
                    bus.clone(),
                    Arc::clone(clock),
                )) as Arc<dyn Tool>
            })
            .collect()
    }

    /// Base event stamped with the context's current counters.
    fn event(&self, event_type: EventType) -> ExecutionEvent {
        let ctx = self.ctx.lock();
        ExecutionEvent::new(
            ctx.execution_id.clone(),
            ctx.step_count,
            event_type,
            self.clock.epoch_ms(),
        )
        .with_counters(ctx.token_usage, ctx.step_count, ctx.tool_calls)
    }

    async fn append(&self, event: ExecutionEvent) -> Result<(), ToolError> {
        self.event_store
            .append(event.clone())
            .await
            .map_err(|e: StorageError| ToolError::Storage(e.to_string()))?;
        self.bus.publish(&event);
        Ok(())
    }

    /// Prior successful result for this key within the execution, if any.
    async fn stored_result(&self, hash: &str) -> Result<Option<Value>, ToolError> {
        let execution_id = self.ctx.lock().execution_id.clone();
        let events = self
            .event_store
            .get(&execution_id, 0, None)
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;

        for event in events {
            if event.event_type != EventType::ToolCallSuccess {
                continue;
            }
            let matches = event
                .input_data
                .as_ref()
                .and_then(|d| d.get("tool_hash"))
                .and_then(Value::as_str)
                == Some(hash);
            if matches {
                let result = event
                    .output_data
                    .and_then(|d| d.get("result").cloned())
                    .unwrap_or(Value::Null);
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Tool for IdempotentTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let hash = tool_call_hash(self.inner.name(), &args);

        // Replay a prior identical call instead of re-running the side
        // effect.
        if let Some(result) = self.stored_result(&hash).await? {
            info!(tool = self.inner.name(), "duplicate tool call, replaying stored result");
            let skipped = self
                .event(EventType::IdempotentToolSkipped)
                .with_input(json!({ "tool_name": self.inner.name(), "tool_hash": hash }));
            self.append(skipped).await?;
            return Ok(result);
        }

        // Count the call and re-check budgets before the side effect runs.
        let policy_ctx = {
            let mut ctx = self.ctx.lock();
            ctx.tool_calls += 1;
            ctx.policy_context()
        };
        self.policy.validate(&policy_ctx, self.clock.as_ref())?;

        let call = self
            .event(EventType::ToolCall)
            .with_input(json!({ "tool_name": self.inner.name(), "args": args }));
        self.append(call).await?;

        match self.inner.invoke(args).await {
            Ok(result) => {
                let success = self
                    .event(EventType::ToolCallSuccess)
                    .with_input(json!({ "tool_name": self.inner.name(), "tool_hash": hash }))
                    .with_output(json!({ "result": result }));
                self.append(success).await?;
                Ok(result)
            }
            Err(err) => {
                let failed = self
                    .event(EventType::ToolCallFailed)
                    .with_input(json!({ "tool_name": self.inner.name(), "tool_hash": hash }))
                    .with_error(err.to_string());
                self.append(failed).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tool_tests.rs"]
mod tests;
