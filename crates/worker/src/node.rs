// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker node: fetches jobs and drives them through the orchestrator.
//!
//! On startup the node runs the reaper once to clean up after any
//! previous crash, then loops: fetch with a bounded blocking timeout,
//! execute, acknowledge. Heartbeats are emitted from a separate task with
//! a TTL greater than the refresh interval. Graceful shutdown stops
//! pulling new jobs, finishes the one in flight, and exits.

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::queue::{Job, JobQueue, JobResult};
use fm_adapters::AgentRegistry;
use fm_core::{ExecutionReport, IdGen, Policy, ShortId, UuidIdGen, WorkerId};
use fm_engine::{CancelToken, Orchestrator};
use fm_storage::{EventStore, PersistenceAdapter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why the worker loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Shutdown was requested via the cancellation handle.
    Requested,
}

/// One worker in the fleet; processes a single job at a time.
pub struct WorkerNode {
    queue: Arc<dyn JobQueue>,
    registry: AgentRegistry,
    event_store: Arc<dyn EventStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    worker_id: WorkerId,
    config: WorkerConfig,
    shutdown: CancelToken,
}

impl WorkerNode {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: AgentRegistry,
        event_store: Arc<dyn EventStore>,
        persistence: Arc<dyn PersistenceAdapter>,
        config: WorkerConfig,
    ) -> Self {
        let generated = UuidIdGen.next();
        let worker_id = WorkerId::new(generated.short(8));
        Self {
            queue,
            registry,
            event_store,
            persistence,
            worker_id,
            config,
            shutdown: CancelToken::new(),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Handle used to request graceful shutdown.
    pub fn shutdown_handle(&self) -> CancelToken {
        self.shutdown.clone()
    }

    /// Run until shutdown is requested.
    pub async fn run(&self) -> Result<ShutdownReason, WorkerError> {
        info!(worker_id = %self.worker_id, "worker starting");

        // Clean up after any previous crash before taking new work.
        match self.queue.reap_dead_workers().await {
            Ok(0) => {}
            Ok(requeued) => info!(requeued, "reaper requeued jobs from dead workers"),
            Err(err) => warn!(error = %err, "startup reap failed"),
        }

        let heartbeat = self.spawn_heartbeat();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let fetched = tokio::select! {
                fetched = self.queue.fetch_job(&self.worker_id, self.config.poll_timeout()) => fetched,
                _ = self.shutdown.cancelled() => break,
            };

            match fetched {
                Ok(Some(job)) => self.process_job(job).await,
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "failed to fetch job");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        heartbeat.abort();
        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(ShutdownReason::Requested)
    }

    fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let worker_id = self.worker_id.clone();
        let interval = self.config.heartbeat_interval();
        let ttl = self.config.heartbeat_ttl();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = queue.heartbeat(&worker_id, ttl).await {
                            warn!(error = %err, "heartbeat failed");
                        }
                    }
                    _ = shutdown.cancelled() => return,
                }
            }
        })
    }

    async fn process_job(&self, job: Job) {
        info!(job_id = %job.job_id, agent = %job.payload.agent, "processing job");

        match self.execute_job(&job).await {
            Ok(report) => {
                let result = JobResult::from_report(report);
                if let Err(err) = self
                    .queue
                    .complete_job(&self.worker_id, &job.job_id, &result)
                    .await
                {
                    error!(job_id = %job.job_id, error = %err, "failed to complete job");
                }
            }
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "job failed");
                if let Err(fail_err) = self
                    .queue
                    .fail_job(&self.worker_id, &job.job_id, &err.to_string())
                    .await
                {
                    error!(job_id = %job.job_id, error = %fail_err, "failed to record job failure");
                }
            }
        }
    }

    /// Build the agent and policy from the payload and run the execution.
    ///
    /// The report is returned whatever its status — a failed execution is
    /// still an acknowledged job. Only worker-side faults (unknown agent)
    /// surface as errors and trigger the fail/retry path.
    async fn execute_job(&self, job: &Job) -> Result<ExecutionReport, WorkerError> {
        let agent = self.registry.create(&job.payload.agent)?;

        let mut policy = Policy::default();
        if let Some(max_steps) = job.payload.max_steps {
            policy = policy.with_max_steps(max_steps);
        }
        if let Some(max_tokens) = job.payload.max_tokens {
            policy = policy.with_max_tokens(max_tokens);
        }

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.event_store),
            Arc::clone(&self.persistence),
            policy,
        );
        Ok(orchestrator.run(agent, &job.payload.task).await)
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
