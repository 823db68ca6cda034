// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG scheduler scenarios: the diamond graph with level-wise
//! parallelism.

use fm_adapters::ScriptedAgent;
use fm_core::{Policy, RetryConfig};
use fm_engine::{GraphExecutor, TaskGraph, TaskNode};
use fm_storage::{MemoryEventStore, MemoryPersistence};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn delayed_agent(name: &str, delay: Duration) -> Arc<ScriptedAgent> {
    Arc::new(
        ScriptedAgent::named(name)
            .with_output(json!({"output": format!("{name}-out")}))
            .with_execute_delay(delay),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diamond_overlaps_siblings_and_orders_levels() {
    let delay = Duration::from_millis(100);
    let a = delayed_agent("a", delay);
    let b = delayed_agent("b", delay);
    let c = delayed_agent("c", delay);
    let d = delayed_agent("d", delay);

    let mut graph = TaskGraph::new();
    graph.add_node(TaskNode::new("a", a)).unwrap();
    graph
        .add_node(TaskNode::new("b", b).depends_on(&["a"]))
        .unwrap();
    graph
        .add_node(TaskNode::new("c", c).depends_on(&["a"]))
        .unwrap();
    graph
        .add_node(TaskNode::new("d", d.clone()).depends_on(&["b", "c"]))
        .unwrap();

    let mut executor = GraphExecutor::new(
        graph,
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemoryPersistence::new()),
        Policy::new().with_retry(RetryConfig::none()),
    )
    .unwrap()
    .with_max_concurrency(3);

    let started = Instant::now();
    let results = executor.execute("assemble the dossier").await.unwrap();
    let elapsed = started.elapsed();

    // Four nodes, three levels: b and c overlapped, so the wall clock is
    // strictly under the 400ms a serial run would need.
    assert_eq!(results.len(), 4);
    assert!(results.values().all(|r| r.succeeded()));
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");

    // d only started after both b and c produced terminal output: its
    // augmented task carries both of their final outputs.
    let d_task = d
        .calls()
        .iter()
        .find_map(|call| match call {
            fm_adapters::AgentCall::Execute { task } => Some(task.clone()),
            _ => None,
        })
        .unwrap();
    assert!(d_task.contains("- b: b-out"));
    assert!(d_task.contains("- c: c-out"));
}
