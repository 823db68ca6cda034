// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job queue.
//!
//! Mirrors the Redis list discipline exactly — submit pushes the tail of
//! `jobs`, fetch pops the tail onto the head of the worker's processing
//! list, the reaper drains dead workers' lists back to the head of
//! `jobs` — so queue tests exercise the same ordering semantics the
//! durable implementation has.

use crate::error::QueueError;
use crate::queue::{Job, JobQueue, JobResult};
use async_trait::async_trait;
use fm_core::{IdGen, JobId, JobRequest, JobStatus, UuidIdGen, WorkerId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Poll granularity for blocking fetch/result waits.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Default)]
struct Inner {
    jobs: VecDeque<Job>,
    processing: HashMap<WorkerId, VecDeque<Job>>,
    meta: HashMap<JobId, Job>,
    results: HashMap<JobId, JobResult>,
    /// Heartbeat expiry instants.
    heartbeats: HashMap<WorkerId, Instant>,
}

/// Volatile queue for tests and single-process runs.
#[derive(Default)]
pub struct MemoryJobQueue {
    inner: Mutex<Inner>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_take(&self, worker_id: &WorkerId) -> Option<Job> {
        let mut inner = self.inner.lock();
        let mut job = inner.jobs.pop_back()?;
        job.status = JobStatus::Running;
        job.updated_at = chrono::Utc::now();
        inner.meta.insert(job.job_id.clone(), job.clone());
        inner
            .processing
            .entry(worker_id.clone())
            .or_default()
            .push_front(job.clone());
        Some(job)
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn submit_job(&self, payload: JobRequest, retries: u32) -> Result<JobId, QueueError> {
        let job_id = JobId::new(UuidIdGen.next());
        let job = Job::new(job_id.clone(), payload, retries);

        let mut inner = self.inner.lock();
        inner.meta.insert(job_id.clone(), job.clone());
        inner.jobs.push_back(job);
        Ok(job_id)
    }

    async fn fetch_job(
        &self,
        worker_id: &WorkerId,
        timeout: Duration,
    ) -> Result<Option<Job>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.try_take(worker_id) {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn complete_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        result: &JobResult,
    ) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if let Some(list) = inner.processing.get_mut(worker_id) {
            list.pop_front();
        }
        inner.results.insert(job_id.clone(), result.clone());
        if let Some(job) = inner.meta.get_mut(job_id) {
            job.status = result.status;
            job.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn fail_job(
        &self,
        worker_id: &WorkerId,
        job_id: &JobId,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if let Some(list) = inner.processing.get_mut(worker_id) {
            list.pop_front();
        }

        let Some(mut job) = inner.meta.get(job_id).cloned() else {
            return Err(QueueError::JobNotFound(job_id.clone()));
        };

        if job.retries_left > 0 {
            job.retries_left -= 1;
            job.status = JobStatus::Pending;
            job.updated_at = chrono::Utc::now();
            inner.meta.insert(job_id.clone(), job.clone());
            inner.jobs.push_back(job);
        } else {
            inner.results.insert(job_id.clone(), JobResult::failed(error));
            if let Some(job) = inner.meta.get_mut(job_id) {
                job.status = JobStatus::Failed;
                job.updated_at = chrono::Utc::now();
            }
        }
        Ok(())
    }

    async fn heartbeat(&self, worker_id: &WorkerId, ttl: Duration) -> Result<(), QueueError> {
        self.inner
            .lock()
            .heartbeats
            .insert(worker_id.clone(), Instant::now() + ttl);
        Ok(())
    }

    async fn dead_workers(&self) -> Result<Vec<WorkerId>, QueueError> {
        let inner = self.inner.lock();
        let now = Instant::now();
        Ok(inner
            .processing
            .iter()
            .filter(|(worker_id, list)| {
                !list.is_empty()
                    && inner
                        .heartbeats
                        .get(*worker_id)
                        .map_or(true, |expiry| *expiry <= now)
            })
            .map(|(worker_id, _)| worker_id.clone())
            .collect())
    }

    async fn reap_dead_workers(&self) -> Result<u32, QueueError> {
        let dead = self.dead_workers().await?;

        let mut inner = self.inner.lock();
        let mut requeued = 0;
        for worker_id in dead {
            tracing::info!(worker_id = %worker_id, "recovering dead worker");
            let Some(mut list) = inner.processing.remove(&worker_id) else {
                continue;
            };
            // Tail of the processing list back to the head of `jobs`,
            // one element at a time.
            while let Some(mut job) = list.pop_back() {
                job.status = JobStatus::Pending;
                job.updated_at = chrono::Utc::now();
                inner.meta.insert(job.job_id.clone(), job.clone());
                inner.jobs.push_front(job);
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<Option<JobStatus>, QueueError> {
        Ok(self.inner.lock().meta.get(job_id).map(|job| job.status))
    }

    async fn fetch_result(
        &self,
        job_id: &JobId,
        wait: Duration,
    ) -> Result<Option<JobResult>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(result) = self.inner.lock().results.get(job_id).cloned() {
                return Ok(Some(result));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn queue_len(&self) -> Result<u64, QueueError> {
        Ok(self.inner.lock().jobs.len() as u64)
    }

    async fn clear(&self) -> Result<(), QueueError> {
        self.inner.lock().jobs.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
