// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reliable job queue interface.
//!
//! Logical structure, shared by both implementations:
//!
//! - `jobs` — FIFO list of pending jobs (pushed at the tail)
//! - `processing:<worker>` — per-worker in-flight list
//! - `job:<id>` — status and metadata
//! - `result:<id>` — terminal result, TTL-bounded
//! - `worker:<id>` — heartbeat key with a short TTL
//!
//! `fetch_job` atomically moves a job from the tail of `jobs` to the head
//! of the fetching worker's processing list; completion pops that same
//! list. A worker whose heartbeat key is gone while its processing list
//! is non-empty is dead, and the reaper drains its list back to the head
//! of `jobs` one element at a time.

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fm_core::{ExecutionReport, JobId, JobRequest, JobStatus, WorkerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal results live for an hour.
pub const RESULT_TTL_SECS: usize = 3_600;

/// A unit of work on the distributed queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub payload: JobRequest,
    pub status: JobStatus,
    pub retries_left: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: JobId, payload: JobRequest, retries: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            payload,
            status: JobStatus::Pending,
            retries_left: retries,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ExecutionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    /// Result for a finished execution; the job status mirrors the
    /// report's outcome.
    pub fn from_report(report: ExecutionReport) -> Self {
        let status = if report.succeeded() {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        Self {
            status,
            report: Some(report),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            report: None,
            error: Some(error.into()),
        }
    }
}

/// Reliable queue with at-least-once delivery and crash recovery.
///
/// Safe for concurrent use from an unbounded fleet of workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a new job; returns its id. Initial status is PENDING.
    async fn submit_job(&self, payload: JobRequest, retries: u32) -> Result<JobId, QueueError>;

    /// Blocking reliable pop: move a job from `jobs` onto this worker's
    /// processing list and mark it RUNNING. `None` on timeout.
    async fn fetch_job(
        &self,
        worker_id: &WorkerId,
        timeout: Duration,
    ) -> Result<Option<Job>, QueueError>;

    /// Acknowledge the worker's in-flight job and store its result.
    async fn complete_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        result: &JobResult,
    ) -> Result<(), QueueError>;

    /// Drop the in-flight job; re-queue it while retries remain,
    /// otherwise record a FAILED result.
    async fn fail_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        error: &str,
    ) -> Result<(), QueueError>;

    /// Refresh this worker's liveness key. The TTL must exceed the
    /// refresh interval.
    async fn heartbeat(&self, worker_id: &WorkerId, ttl: Duration) -> Result<(), QueueError>;

    /// Workers with in-flight jobs but no live heartbeat.
    async fn dead_workers(&self) -> Result<Vec<WorkerId>, QueueError>;

    /// Requeue every job held by a dead worker; returns how many jobs
    /// were returned to `jobs`. Idempotent.
    async fn reap_dead_workers(&self) -> Result<u32, QueueError>;

    /// Current status of a job, if known.
    async fn job_status(&self, job_id: &JobId) -> Result<Option<JobStatus>, QueueError>;

    /// Terminal result, polling up to `wait`. `None` if not ready.
    async fn fetch_result(
        &self,
        job_id: &JobId,
        wait: Duration,
    ) -> Result<Option<JobResult>, QueueError>;

    /// Number of pending jobs.
    async fn queue_len(&self) -> Result<u64, QueueError>;

    /// Drop all pending jobs (maintenance).
    async fn clear(&self) -> Result<(), QueueError>;
}
