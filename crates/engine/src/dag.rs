// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG scheduler: topological level execution with bounded concurrency.
//!
//! A [`TaskGraph`] is validated (unknown dependencies, cycles) and
//! partitioned into levels with Kahn's algorithm. Nodes within a level
//! run concurrently under a semaphore; levels are strictly sequential, so
//! every node observes the terminal results of all its direct
//! dependencies.

use crate::orchestrator::Orchestrator;
use fm_adapters::AgentAdapter;
use fm_core::{ExecutionReport, Policy};
use fm_storage::{EventStore, PersistenceAdapter};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Graph construction and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node '{0}' already exists in graph")]
    DuplicateNode(String),
    #[error("node '{node}' depends on '{dependency}', which does not exist")]
    UnknownDependency { node: String, dependency: String },
    #[error("graph contains a cycle involving '{0}'")]
    Cycle(String),
    #[error("node '{0}' not found in graph")]
    NodeNotFound(String),
}

/// One task in a workflow graph.
pub struct TaskNode {
    pub name: String,
    pub agent: Arc<dyn AgentAdapter>,
    pub dependencies: Vec<String>,
    /// Terminal report, filled in once the node has executed.
    pub result: Option<ExecutionReport>,
}

impl TaskNode {
    pub fn new(name: impl Into<String>, agent: Arc<dyn AgentAdapter>) -> Self {
        Self {
            name: name.into(),
            agent,
            dependencies: Vec::new(),
            result: None,
        }
    }

    pub fn depends_on(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// A directed acyclic graph of tasks, in insertion order.
#[derive(Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: TaskNode) -> Result<(), GraphError> {
        if self.nodes.iter().any(|n| n.name == node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Result<&TaskNode, GraphError> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut TaskNode, GraphError> {
        self.nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reject unknown dependency names and cycles (depth-first search
    /// with a recursion stack).
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            for dep in &node.dependencies {
                if !self.nodes.iter().any(|n| &n.name == dep) {
                    return Err(GraphError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut visited: Vec<&str> = Vec::new();
        let mut stack: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if !visited.contains(&node.name.as_str())
                && self.has_cycle(&node.name, &mut visited, &mut stack)?
            {
                return Err(GraphError::Cycle(node.name.clone()));
            }
        }
        Ok(())
    }

    fn has_cycle<'a>(
        &'a self,
        name: &'a str,
        visited: &mut Vec<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Result<bool, GraphError> {
        visited.push(name);
        stack.push(name);

        for dep in &self.node(name)?.dependencies {
            if !visited.contains(&dep.as_str()) {
                if self.has_cycle(dep, visited, stack)? {
                    return Ok(true);
                }
            } else if stack.contains(&dep.as_str()) {
                return Ok(true);
            }
        }

        stack.pop();
        Ok(false)
    }

    /// Kahn's algorithm: partition nodes into levels where every
    /// dependency sits in a strictly earlier level. A non-empty residue
    /// after draining means a cycle.
    pub fn execution_order(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.name.as_str(), n.dependencies.len()))
            .collect();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            for dep in &node.dependencies {
                successors
                    .entry(dep.as_str())
                    .or_default()
                    .push(node.name.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .filter(|n| n.dependencies.is_empty())
            .map(|n| n.name.as_str())
            .collect();

        let mut order = Vec::new();
        let mut processed = 0;

        while !queue.is_empty() {
            let mut level = Vec::new();
            for _ in 0..queue.len() {
                let Some(name) = queue.pop_front() else { break };
                level.push(name.to_string());
                processed += 1;

                for succ in successors.get(name).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*succ);
                        }
                    }
                }
            }
            order.push(level);
        }

        if processed != self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .find(|n| in_degree.get(n.name.as_str()).copied().unwrap_or(0) > 0)
                .map(|n| n.name.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(order)
    }
}

/// Executes a [`TaskGraph`] level by level with bounded concurrency.
///
/// Each node runs through a fresh orchestrator against the shared stores;
/// the augmented task text carries the final outputs of the node's direct
/// dependencies in declaration order.
pub struct GraphExecutor {
    graph: TaskGraph,
    event_store: Arc<dyn EventStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    policy: Policy,
    max_concurrency: usize,
}

impl GraphExecutor {
    pub fn new(
        graph: TaskGraph,
        event_store: Arc<dyn EventStore>,
        persistence: Arc<dyn PersistenceAdapter>,
        policy: Policy,
    ) -> Result<Self, GraphError> {
        graph.validate()?;
        Ok(Self {
            graph,
            event_store,
            persistence,
            policy,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run all levels in order; nodes inside a level run concurrently.
    ///
    /// A level only starts once every node of the previous level has
    /// produced its terminal report.
    pub async fn execute(
        &mut self,
        task: &str,
    ) -> Result<HashMap<String, ExecutionReport>, GraphError> {
        let order = self.graph.execution_order()?;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut results = HashMap::new();

        for (index, level) in order.iter().enumerate() {
            info!(level = index, nodes = level.len(), "executing graph level");

            let mut handles = Vec::with_capacity(level.len());
            for name in level {
                let node = self.graph.node(name)?;
                let augmented = self.augment_task(task, node);
                let agent = Arc::clone(&node.agent);
                let orchestrator = Orchestrator::new(
                    Arc::clone(&self.event_store),
                    Arc::clone(&self.persistence),
                    self.policy.clone(),
                );
                let semaphore = Arc::clone(&semaphore);
                let name = name.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let report = orchestrator.run(agent, &augmented).await;
                    (name, report)
                }));
            }

            // Barrier: wait for the whole level before starting the next.
            for handle in handles {
                match handle.await {
                    Ok((name, report)) => {
                        self.graph.node_mut(&name)?.result = Some(report.clone());
                        results.insert(name, report);
                    }
                    Err(err) => error!(error = %err, "graph node task panicked"),
                }
            }
        }

        Ok(results)
    }

    /// Append dependency outputs, in declaration order, to the task text.
    fn augment_task(&self, task: &str, node: &TaskNode) -> String {
        let mut context = String::new();
        for dep in &node.dependencies {
            let output = self
                .graph
                .node(dep)
                .ok()
                .and_then(|n| n.result.as_ref())
                .and_then(|r| r.final_output.clone());
            if let Some(output) = output {
                context.push_str(&format!("- {dep}: {output}\n"));
            }
        }

        if context.is_empty() {
            task.to_string()
        } else {
            format!("{task}\n\nContext from previous tasks:\n{context}")
        }
    }
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
