// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-engine: the execution engine of the Foreman runtime.
//!
//! The [`Orchestrator`] drives a single agent through the lifecycle state
//! machine, appending every observable transition to the event log — the
//! durable checkpoints that crash recovery replays. Around it sit the
//! retry executor, the idempotent tool wrapper, the live event fan-out,
//! the DAG scheduler for parallel fan-out/fan-in, and the recovery
//! manager.

pub mod bus;
pub mod cancel;
pub mod context;
pub mod dag;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod tool;

pub use bus::{EventBus, EventSubscriber};
pub use cancel::CancelToken;
pub use context::{ExecutionContext, SharedContext};
pub use dag::{GraphError, GraphExecutor, TaskGraph, TaskNode};
pub use error::EngineError;
pub use orchestrator::{Orchestrator, RunOptions};
pub use recovery::{RecoveredExecution, RecoveryManager, MAX_RECOVERY_ATTEMPTS};
pub use retry::{execute_with_retry, RetryFailure};
pub use tool::{tool_call_hash, IdempotentTool};
