// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-injected agent registry.
//!
//! Maps agent names to factories. Bound at construction and passed to the
//! components that need it (workers, recovery); deliberately not a
//! process-global.

use crate::agent::{AdapterError, AgentAdapter};
use crate::echo::EchoAgent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a fresh adapter instance per execution.
pub trait AgentFactory: Send + Sync {
    fn create(&self) -> Arc<dyn AgentAdapter>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Arc<dyn AgentAdapter> + Send + Sync,
{
    fn create(&self) -> Arc<dyn AgentAdapter> {
        self()
    }
}

/// Name → factory map for resolving agents from submissions and
/// recovered snapshots.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: HashMap<String, Arc<dyn AgentFactory>>,
}

impl AgentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `echo` agent.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("echo", || Arc::new(EchoAgent::new()) as Arc<dyn AgentAdapter>);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl AgentFactory + 'static) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Resolve an agent by name.
    pub fn create(&self, name: &str) -> Result<Arc<dyn AgentAdapter>, AdapterError> {
        debug!(agent = name, "resolving agent adapter");
        self.factories
            .get(name)
            .map(|factory| factory.create())
            .ok_or_else(|| AdapterError::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
