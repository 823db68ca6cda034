// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy budgets enforced at the top of every lifecycle iteration.
//!
//! A breach raises a typed [`PolicyViolation`] naming the budget. On
//! simultaneous breaches the check order is timeout → steps → tokens →
//! tool-calls.

use crate::clock::Clock;
use crate::retry::RetryConfig;
use indexmap::IndexMap;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A budget was exceeded. Never retried; terminal for the execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("execution timeout exceeded: {elapsed_ms}ms elapsed, limit {limit_ms}ms")]
    TimeoutExceeded { elapsed_ms: u64, limit_ms: u64 },
    #[error("maximum execution steps exceeded: {steps} steps, limit {limit}")]
    MaxStepsExceeded { steps: u64, limit: u64 },
    #[error("maximum token budget exceeded: {tokens} tokens, limit {limit}")]
    TokenBudgetExceeded { tokens: u64, limit: u64 },
    #[error("maximum tool calls exceeded: {calls} calls, limit {limit}")]
    MaxToolCallsExceeded { calls: u64, limit: u64 },
}

/// The counters a policy check runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyContext {
    pub step_count: u64,
    pub token_usage: u64,
    pub tool_calls: u64,
}

/// Execution budgets plus the retry configuration applied in EXECUTE.
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_steps: u64,
    pub max_tokens: u64,
    pub max_tool_calls: u64,
    pub timeout: Duration,
    pub retry: RetryConfig,
    started_at: Option<Instant>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_tokens: 4_000,
            max_tool_calls: 5,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            started_at: None,
        }
    }
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: u64) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Anchor the wall-clock budget. Called once at the start of a run.
    pub fn start_timer(&mut self, clock: &dyn Clock) {
        self.started_at = Some(clock.now());
    }

    /// Validate all budgets against the current counters.
    ///
    /// Check order on simultaneous breaches: timeout, steps, tokens,
    /// tool-calls. Each comparison is strictly greater-than its budget.
    pub fn validate(&self, ctx: &PolicyContext, clock: &dyn Clock) -> Result<(), PolicyViolation> {
        if let Some(started_at) = self.started_at {
            let elapsed = clock.now().saturating_duration_since(started_at);
            if elapsed > self.timeout {
                return Err(PolicyViolation::TimeoutExceeded {
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: self.timeout.as_millis() as u64,
                });
            }
        }

        if ctx.step_count > self.max_steps {
            return Err(PolicyViolation::MaxStepsExceeded {
                steps: ctx.step_count,
                limit: self.max_steps,
            });
        }

        if ctx.token_usage > self.max_tokens {
            return Err(PolicyViolation::TokenBudgetExceeded {
                tokens: ctx.token_usage,
                limit: self.max_tokens,
            });
        }

        if ctx.tool_calls > self.max_tool_calls {
            return Err(PolicyViolation::MaxToolCallsExceeded {
                calls: ctx.tool_calls,
                limit: self.max_tool_calls,
            });
        }

        Ok(())
    }

    /// Ordered configuration map stored in execution snapshots.
    pub fn config_map(&self) -> IndexMap<String, Value> {
        let mut config = IndexMap::new();
        config.insert("max_steps".to_string(), Value::from(self.max_steps));
        config.insert("max_tokens".to_string(), Value::from(self.max_tokens));
        config.insert(
            "max_tool_calls".to_string(),
            Value::from(self.max_tool_calls),
        );
        config.insert(
            "timeout_seconds".to_string(),
            Value::from(self.timeout.as_secs()),
        );
        config.insert(
            "retry".to_string(),
            serde_json::to_value(&self.retry).unwrap_or(Value::Null),
        );
        config
    }

    /// Rebuild a policy from a snapshot's `policy_config` map.
    ///
    /// Unknown keys are ignored; missing keys keep defaults. Used by the
    /// recovery manager, which only has the persisted snapshot.
    pub fn from_config_map(config: &IndexMap<String, Value>) -> Self {
        let mut policy = Self::default();
        if let Some(v) = config.get("max_steps").and_then(Value::as_u64) {
            policy.max_steps = v;
        }
        if let Some(v) = config.get("max_tokens").and_then(Value::as_u64) {
            policy.max_tokens = v;
        }
        if let Some(v) = config.get("max_tool_calls").and_then(Value::as_u64) {
            policy.max_tool_calls = v;
        }
        if let Some(v) = config.get("timeout_seconds").and_then(Value::as_u64) {
            policy.timeout = Duration::from_secs(v);
        }
        if let Some(retry) = config
            .get("retry")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
        {
            policy.retry = retry;
        }
        policy
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
