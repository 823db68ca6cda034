// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the end-to-end scenarios.

use fm_core::Policy;
use fm_engine::Orchestrator;
use fm_storage::{EventStore, MemoryEventStore, MemoryPersistence, PersistenceAdapter};
use std::sync::Arc;

pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub event_store: Arc<MemoryEventStore>,
    pub persistence: Arc<MemoryPersistence>,
}

/// Orchestrator over fresh in-memory backends.
pub fn runtime(policy: Policy) -> Runtime {
    let event_store = Arc::new(MemoryEventStore::new());
    let persistence = Arc::new(MemoryPersistence::new());
    let orchestrator = Orchestrator::new(
        event_store.clone() as Arc<dyn EventStore>,
        persistence.clone() as Arc<dyn PersistenceAdapter>,
        policy,
    );
    Runtime {
        orchestrator,
        event_store,
        persistence,
    }
}
