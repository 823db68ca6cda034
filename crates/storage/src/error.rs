// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error type shared by the event store and persistence adapter.

use fm_core::EventError;
use thiserror::Error;

/// Errors from event-log or persistence operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
