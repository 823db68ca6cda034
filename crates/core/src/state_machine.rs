// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic lifecycle controller for a single execution.
//!
//! The lifecycle is INIT → PLAN → EXECUTE → REVIEW → TERMINATE, with FAILED
//! reachable from any state. Every transition is validated and recorded in
//! an ordered history; replay hydration uses `force_set`, which bypasses
//! validation but never bypasses history.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Lifecycle states of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Init,
    Plan,
    Execute,
    Review,
    Terminate,
    Failed,
}

impl LifecycleState {
    /// Stable wire name (matches the serialized form).
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Init => "INIT",
            LifecycleState::Plan => "PLAN",
            LifecycleState::Execute => "EXECUTE",
            LifecycleState::Review => "REVIEW",
            LifecycleState::Terminate => "TERMINATE",
            LifecycleState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Terminate | LifecycleState::Failed)
    }

    /// States legally reachable from this one via `transition`.
    fn successors(&self) -> &'static [LifecycleState] {
        match self {
            LifecycleState::Init => &[LifecycleState::Plan, LifecycleState::Failed],
            LifecycleState::Plan => &[LifecycleState::Execute, LifecycleState::Failed],
            LifecycleState::Execute => &[LifecycleState::Review, LifecycleState::Failed],
            LifecycleState::Review => &[LifecycleState::Terminate, LifecycleState::Failed],
            LifecycleState::Terminate | LifecycleState::Failed => &[],
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attempted transition outside the legal lifecycle graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} to {to}")]
pub struct InvalidStateTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Lifecycle state machine with full ordered history.
///
/// Owned by exactly one orchestrator run; never shared.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: LifecycleState,
    history: Vec<LifecycleState>,
    entry_times: HashMap<LifecycleState, Instant>,
}

impl StateMachine {
    pub fn new(clock: &dyn Clock) -> Self {
        let mut entry_times = HashMap::new();
        entry_times.insert(LifecycleState::Init, clock.now());
        Self {
            current: LifecycleState::Init,
            history: vec![LifecycleState::Init],
            entry_times,
        }
    }

    /// Move to the next state if the transition is legal.
    pub fn transition(
        &mut self,
        next: LifecycleState,
        clock: &dyn Clock,
    ) -> Result<(), InvalidStateTransition> {
        if !self.current.successors().contains(&next) {
            return Err(InvalidStateTransition {
                from: self.current,
                to: next,
            });
        }

        info!(from = %self.current, to = %next, "state transition");
        self.current = next;
        self.history.push(next);
        self.entry_times.insert(next, clock.now());
        Ok(())
    }

    /// Force-set the current state, bypassing transition validation.
    ///
    /// Exists only for replay hydration. Even forced states are appended to
    /// history so the record stays complete.
    pub fn force_set(&mut self, state: LifecycleState, clock: &dyn Clock) {
        warn!(state = %state, "force setting state (bypassing validation)");
        self.current = state;
        if self.history.last() != Some(&state) {
            self.history.push(state);
            self.entry_times.insert(state, clock.now());
        }
    }

    /// Move to FAILED immediately, from any state.
    pub fn fail(&mut self, clock: &dyn Clock) {
        self.current = LifecycleState::Failed;
        self.history.push(LifecycleState::Failed);
        self.entry_times.insert(LifecycleState::Failed, clock.now());
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn current(&self) -> LifecycleState {
        self.current
    }

    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// How long the machine has been in the current state.
    pub fn current_state_duration(&self, clock: &dyn Clock) -> Duration {
        self.entry_times
            .get(&self.current)
            .map(|entered| clock.now().saturating_duration_since(*entered))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
