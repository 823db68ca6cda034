// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios.
//!
//! These tests wire the real crates together — engine, storage,
//! adapters, worker — over in-memory backends and exercise full
//! execution lifecycles: happy paths, budget violations, crash/resume,
//! idempotent tools, graph fan-out, and the distributed queue.

mod specs {
    pub mod prelude;

    mod distributed;
    mod graph;
    mod lifecycle;
    mod recovery;
}
