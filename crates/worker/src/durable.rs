// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed reliable queue.
//!
//! Key layout:
//! - `fm:jobs` — pending list (RPUSH / BRPOPLPUSH)
//! - `fm:processing:<worker>` — per-worker in-flight list
//! - `fm:job:<id>` — hash with `data` and `status` fields
//! - `fm:result:<id>` — terminal result, one-hour TTL
//! - `fm:worker:<id>` — heartbeat key with a short TTL
//!
//! `BRPOPLPUSH` gives the atomic move from the pending tail to the
//! processing head; the reaper's `RPOPLPUSH` is atomic per element, so a
//! crash mid-drain loses nothing.

use crate::error::QueueError;
use crate::queue::{Job, JobQueue, JobResult, RESULT_TTL_SECS};
use async_trait::async_trait;
use fm_core::{IdGen, JobId, JobRequest, JobStatus, UuidIdGen, WorkerId};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

const JOBS_KEY: &str = "fm:jobs";

fn processing_key(worker_id: &WorkerId) -> String {
    format!("fm:processing:{worker_id}")
}

fn job_key(job_id: &JobId) -> String {
    format!("fm:job:{job_id}")
}

fn result_key(job_id: &JobId) -> String {
    format!("fm:result:{job_id}")
}

fn worker_key(worker_id: &WorkerId) -> String {
    format!("fm:worker:{worker_id}")
}

/// Poll granularity while waiting for a result.
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Distributed queue over a shared Redis.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn })
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn write_job_meta(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: () = conn.hset(job_key(&job.job_id), "data", payload).await?;
        let _: () = conn
            .hset(job_key(&job.job_id), "status", job.status.to_string())
            .await?;
        Ok(())
    }

    async fn read_job_meta(&self, job_id: &JobId) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(job_key(job_id), "data").await?;
        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(job_key(job_id), "status", status.to_string())
            .await?;
        Ok(())
    }

    async fn store_result(&self, job_id: &JobId, result: &JobResult) -> Result<(), QueueError> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(result_key(job_id), payload).await?;
        let _: () = conn.expire(result_key(job_id), RESULT_TTL_SECS).await?;
        self.set_status(job_id, result.status).await
    }

    /// Processing-list keys currently present.
    async fn processing_keys(&self) -> Result<Vec<String>, QueueError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> =
            conn.scan_match("fm:processing:*").await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn submit_job(&self, payload: JobRequest, retries: u32) -> Result<JobId, QueueError> {
        let job_id = JobId::new(UuidIdGen.next());
        let job = Job::new(job_id.clone(), payload, retries);

        self.write_job_meta(&job).await?;

        let payload = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(JOBS_KEY, payload).await?;
        Ok(job_id)
    }

    async fn fetch_job(
        &self,
        worker_id: &WorkerId,
        timeout: Duration,
    ) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .brpoplpush(
                JOBS_KEY,
                &processing_key(worker_id),
                timeout.as_secs().max(1) as usize,
            )
            .await?;

        let Some(payload) = raw else {
            return Ok(None);
        };

        let mut job: Job = serde_json::from_str(&payload)?;
        job.status = JobStatus::Running;
        job.updated_at = chrono::Utc::now();
        self.write_job_meta(&job).await?;
        Ok(Some(job))
    }

    async fn complete_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        result: &JobResult,
    ) -> Result<(), QueueError> {
        // One job in flight per worker: the head of the processing list
        // is the job being acknowledged.
        let mut conn = self.conn.clone();
        let _: Option<String> = conn.lpop(processing_key(worker_id), None).await?;

        self.store_result(job_id, result).await
    }

    async fn fail_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: Option<String> = conn.lpop(processing_key(worker_id), None).await?;

        let Some(mut job) = self.read_job_meta(job_id).await? else {
            return Err(QueueError::JobNotFound(job_id.clone()));
        };

        if job.retries_left > 0 {
            job.retries_left -= 1;
            job.status = JobStatus::Pending;
            job.updated_at = chrono::Utc::now();
            self.write_job_meta(&job).await?;

            let payload = serde_json::to_string(&job)?;
            let _: () = conn.rpush(JOBS_KEY, payload).await?;
            info!(job_id = %job_id, retries_left = job.retries_left, "job requeued after failure");
        } else {
            info!(job_id = %job_id, error, "job failed permanently");
            self.store_result(job_id, &JobResult::failed(error)).await?;
        }
        Ok(())
    }

    async fn heartbeat(&self, worker_id: &WorkerId, ttl: Duration) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(
                worker_key(worker_id),
                "alive",
                ttl.as_secs().max(1) as usize,
            )
            .await?;
        Ok(())
    }

    async fn dead_workers(&self) -> Result<Vec<WorkerId>, QueueError> {
        let mut dead = Vec::new();
        for key in self.processing_keys().await? {
            let Some(worker_id) = key.strip_prefix("fm:processing:") else {
                continue;
            };
            let worker_id = WorkerId::new(worker_id);

            let mut conn = self.conn.clone();
            let in_flight: u64 = conn.llen(&key).await?;
            let alive: bool = conn.exists(worker_key(&worker_id)).await?;
            if in_flight > 0 && !alive {
                dead.push(worker_id);
            }
        }
        Ok(dead)
    }

    async fn reap_dead_workers(&self) -> Result<u32, QueueError> {
        let dead = self.dead_workers().await?;

        let mut requeued = 0;
        for worker_id in dead {
            info!(worker_id = %worker_id, "recovering dead worker");
            let key = processing_key(&worker_id);
            let mut conn = self.conn.clone();

            // Drain tail → head of `jobs`, atomic per element.
            loop {
                let moved: Option<String> = conn.rpoplpush(key.as_str(), JOBS_KEY).await?;
                if moved.is_none() {
                    break;
                }
                requeued += 1;
            }
            let _: () = conn.del(&key).await?;
        }
        Ok(requeued)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<Option<JobStatus>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(job_key(job_id), "status").await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    async fn fetch_result(
        &self,
        job_id: &JobId,
        wait: Duration,
    ) -> Result<Option<JobResult>, QueueError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let mut conn = self.conn.clone();
            let raw: Option<String> = conn.get(result_key(job_id)).await?;
            if let Some(payload) = raw {
                return Ok(Some(serde_json::from_str(&payload)?));
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
        }
    }

    async fn queue_len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(JOBS_KEY).await?;
        Ok(len)
    }

    async fn clear(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(JOBS_KEY).await?;
        Ok(())
    }
}
