// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed queue scenarios: async submission through a worker and
//! at-least-once delivery across a worker crash.

use fm_adapters::{AgentAdapter, AgentRegistry, ScriptedAgent};
use fm_core::{JobRequest, JobStatus, WorkerId};
use fm_storage::{MemoryEventStore, MemoryPersistence};
use fm_worker::{JobQueue, MemoryJobQueue, WorkerConfig, WorkerNode};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> AgentRegistry {
    let mut registry = AgentRegistry::with_defaults();
    registry.register("scripted", || {
        Arc::new(ScriptedAgent::new()) as Arc<dyn AgentAdapter>
    });
    registry
}

fn worker(queue: Arc<MemoryJobQueue>) -> Arc<WorkerNode> {
    let config = WorkerConfig {
        poll_timeout_secs: 1,
        heartbeat_interval_secs: 1,
        heartbeat_ttl_secs: 2,
        ..WorkerConfig::default()
    };
    Arc::new(WorkerNode::new(
        queue as Arc<dyn JobQueue>,
        registry(),
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemoryPersistence::new()),
        config,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_async_returns_id_then_status_then_result() {
    let queue = Arc::new(MemoryJobQueue::new());
    let node = worker(Arc::clone(&queue));
    let shutdown = node.shutdown_handle();
    let running = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.run().await })
    };

    // Submission returns immediately with an id.
    let job_id = queue
        .submit_job(
            JobRequest::new("write the summary", "scripted")
                .with_max_steps(10)
                .with_max_tokens(1_000),
            3,
        )
        .await
        .unwrap();
    assert!(queue.job_status(&job_id).await.unwrap().is_some());

    // The result arrives within the wait window.
    let result = queue
        .fetch_result(&job_id, Duration::from_secs(5))
        .await
        .unwrap()
        .expect("worker should produce a result");

    assert_eq!(result.status, JobStatus::Success);
    let report = result.report.unwrap();
    assert_eq!(report.final_output.as_deref(), Some("ok"));
    assert_eq!(
        queue.job_status(&job_id).await.unwrap(),
        Some(JobStatus::Success)
    );

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn crashed_worker_job_reappears_within_one_reap_cycle() {
    let queue = MemoryJobQueue::new();
    let job_id = queue
        .submit_job(JobRequest::new("important", "scripted"), 0)
        .await
        .unwrap();

    // A worker fetches the job and dies without heartbeating.
    let dead = WorkerId::new("doomed");
    queue
        .fetch_job(&dead, Duration::from_millis(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queue.queue_len().await.unwrap(), 0);

    // One reaper cycle returns it to the pending queue.
    let requeued = queue.reap_dead_workers().await.unwrap();
    assert_eq!(requeued, 1);
    assert_eq!(queue.queue_len().await.unwrap(), 1);
    assert_eq!(
        queue.job_status(&job_id).await.unwrap(),
        Some(JobStatus::Pending)
    );

    // A healthy worker then completes it exactly once.
    let survivor = WorkerId::new("survivor");
    let job = queue
        .fetch_job(&survivor, Duration::from_millis(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.job_id, job_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_workers_drain_the_queue_without_duplication() {
    let queue = Arc::new(MemoryJobQueue::new());
    let node_a = worker(Arc::clone(&queue));
    let node_b = worker(Arc::clone(&queue));
    let stop_a = node_a.shutdown_handle();
    let stop_b = node_b.shutdown_handle();
    let run_a = {
        let node = Arc::clone(&node_a);
        tokio::spawn(async move { node.run().await })
    };
    let run_b = {
        let node = Arc::clone(&node_b);
        tokio::spawn(async move { node.run().await })
    };

    let mut job_ids = Vec::new();
    for i in 0..6 {
        job_ids.push(
            queue
                .submit_job(JobRequest::new(format!("job {i}"), "scripted"), 0)
                .await
                .unwrap(),
        );
    }

    for job_id in &job_ids {
        let result = queue
            .fetch_result(job_id, Duration::from_secs(10))
            .await
            .unwrap()
            .expect("every job should finish");
        assert_eq!(result.status, JobStatus::Success);
    }
    assert_eq!(queue.queue_len().await.unwrap(), 0);

    stop_a.cancel();
    stop_b.cancel();
    run_a.await.unwrap().unwrap();
    run_b.await.unwrap().unwrap();
}
