// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side error types.

use fm_adapters::AdapterError;
use fm_core::JobId;
use thiserror::Error;

/// Failures from queue operations.
///
/// A job affected by a queue failure is returned to the pending list by
/// either an explicit `fail_job` or the reaper.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Failures in the worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("configuration error: {0}")]
    Config(String),
}
