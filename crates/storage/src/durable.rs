// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed event store and persistence adapter.
//!
//! Key layout:
//! - `fm:execution:<id>:events` — list, RPUSH in append order
//! - `fm:execution:<id>:spec` — canonical-JSON execution spec
//! - `fm:execution:<id>:steps` — sorted set scored by step_number
//! - `fm:execution:<id>:recovery_count` — integer
//! - `fm:active_executions` — set of ids
//!
//! All per-execution keys carry a 7-day TTL, refreshed on write. The
//! connection manager reconnects transparently; callers just see
//! `StorageError::Redis` on hard failures.

use crate::error::StorageError;
use crate::event_store::{EventStore, RETENTION_SECS};
use crate::persistence::{PersistenceAdapter, StepCheckpoint};
use async_trait::async_trait;
use fm_core::{Execution, ExecutionEvent, ExecutionId};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

fn events_key(execution_id: &ExecutionId) -> String {
    format!("fm:execution:{execution_id}:events")
}

fn spec_key(execution_id: &ExecutionId) -> String {
    format!("fm:execution:{execution_id}:spec")
}

fn steps_key(execution_id: &ExecutionId) -> String {
    format!("fm:execution:{execution_id}:steps")
}

fn recovery_key(execution_id: &ExecutionId) -> String {
    format!("fm:execution:{execution_id}:recovery_count")
}

const ACTIVE_KEY: &str = "fm:active_executions";

/// Event store backed by Redis lists.
///
/// Appends are strictly in step order within one execution, so list order
/// doubles as the sorted index.
#[derive(Clone)]
pub struct RedisEventStore {
    conn: ConnectionManager,
}

impl RedisEventStore {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn })
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn append(&self, event: ExecutionEvent) -> Result<(), StorageError> {
        event.validate()?;

        let key = events_key(&event.execution_id);
        let payload = serde_json::to_string(&event)?;

        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&key, payload).await?;
        let _: () = conn.expire(&key, RETENTION_SECS).await?;
        Ok(())
    }

    async fn get(
        &self,
        execution_id: &ExecutionId,
        from_step: u64,
        to_step: Option<u64>,
    ) -> Result<Vec<ExecutionEvent>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(events_key(execution_id), 0, -1).await?;

        let mut events = Vec::with_capacity(raw.len());
        for line in raw {
            // Skip corrupt entries rather than failing the whole read.
            let event: ExecutionEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(err) => {
                    warn!(execution_id = %execution_id, error = %err, "corrupt event entry, skipping");
                    continue;
                }
            };
            if event.step_number >= from_step
                && to_step.map_or(true, |to| event.step_number <= to)
            {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.step_number);
        Ok(events)
    }

    async fn latest(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionEvent>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(events_key(execution_id), -1, -1).await?;

        match raw.first() {
            Some(line) => Ok(Some(serde_json::from_str(line)?)),
            None => Ok(None),
        }
    }

    async fn count(&self, execution_id: &ExecutionId) -> Result<u64, StorageError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.llen(events_key(execution_id)).await?;
        Ok(count)
    }
}

/// Persistence adapter backed by Redis strings, sorted sets, and sets.
#[derive(Clone)]
pub struct RedisPersistence {
    conn: ConnectionManager,
}

impl RedisPersistence {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn })
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PersistenceAdapter for RedisPersistence {
    async fn save_execution_spec(&self, execution: &Execution) -> Result<(), StorageError> {
        let key = spec_key(&execution.execution_id);
        let payload = serde_json::to_string(execution)?;

        let mut conn = self.conn.clone();
        let _: () = conn.set(&key, payload).await?;
        let _: () = conn.expire(&key, RETENTION_SECS).await?;
        Ok(())
    }

    async fn load_execution_spec(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<Execution>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(spec_key(execution_id)).await?;

        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn save_execution_step(
        &self,
        execution_id: &ExecutionId,
        checkpoint: StepCheckpoint,
    ) -> Result<(), StorageError> {
        let key = steps_key(execution_id);
        let payload = serde_json::to_string(&checkpoint)?;

        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&key, payload, checkpoint.step_number).await?;
        let _: () = conn.expire(&key, RETENTION_SECS).await?;
        Ok(())
    }

    async fn get_execution_step(
        &self,
        execution_id: &ExecutionId,
        step_number: u64,
    ) -> Result<Option<StepCheckpoint>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .zrangebyscore(steps_key(execution_id), step_number, step_number)
            .await?;

        match raw.first() {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }

    async fn execution_history(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<StepCheckpoint>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.zrange(steps_key(execution_id), 0, -1).await?;

        let mut history = Vec::with_capacity(raw.len());
        for payload in raw {
            history.push(serde_json::from_str(&payload)?);
        }
        Ok(history)
    }

    async fn register_active_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(ACTIVE_KEY, execution_id.as_str()).await?;
        Ok(())
    }

    async fn remove_active_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(ACTIVE_KEY, execution_id.as_str()).await?;
        Ok(())
    }

    async fn list_active_executions(&self) -> Result<Vec<ExecutionId>, StorageError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(ACTIVE_KEY).await?;
        Ok(ids.into_iter().map(ExecutionId::new).collect())
    }

    async fn increment_recovery_count(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<u32, StorageError> {
        let key = recovery_key(execution_id);

        let mut conn = self.conn.clone();
        let count: u32 = conn.incr(&key, 1u32).await?;
        let _: () = conn.expire(&key, RETENTION_SECS).await?;
        Ok(count)
    }

    async fn get_recovery_count(&self, execution_id: &ExecutionId) -> Result<u32, StorageError> {
        let mut conn = self.conn.clone();
        let count: Option<u32> = conn.get(recovery_key(execution_id)).await?;
        Ok(count.unwrap_or(0))
    }
}
