// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-adapters: the agent-facing seam of the Foreman runtime.
//!
//! An agent is an opaque, possibly non-deterministic worker behind the
//! [`AgentAdapter`] interface — the runtime never inspects it beyond its
//! stable `name` string. Adapters are resolved by name through a
//! dependency-injected [`AgentRegistry`]; there is no process-global
//! registry.

pub mod agent;
pub mod echo;
pub mod registry;
pub mod tool;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use agent::{AdapterError, AgentAdapter};
pub use echo::EchoAgent;
pub use registry::{AgentFactory, AgentRegistry};
pub use tool::{descriptors, Tool, ToolError};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{AgentCall, ScriptedAgent};
