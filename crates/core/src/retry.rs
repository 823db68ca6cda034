// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry configuration and backoff arithmetic.
//!
//! The async retry executor lives in the engine crate; this module is the
//! pure configuration half that also rides inside execution snapshots.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for computing the delay before attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackoffStrategy {
    Constant,
    Linear,
    Exponential,
    Jitter,
}

/// Bounded retry configuration.
///
/// An error kind is retried iff it is not listed in `non_retryable_errors`
/// and either `retryable_errors` is empty (retry everything) or lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub strategy: BackoffStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retryable_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            strategy: BackoffStrategy::Exponential,
            retryable_errors: Vec::new(),
            non_retryable_errors: Vec::new(),
        }
    }
}

impl RetryConfig {
    /// Config that never retries (single invocation).
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_non_retryable(mut self, kind: impl Into<String>) -> Self {
        self.non_retryable_errors.push(kind.into());
        self
    }

    /// Delay before retry attempt `attempt` (1-based), clamped to
    /// `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay_ms as f64;
        let delay_ms = match self.strategy {
            BackoffStrategy::Constant => initial,
            BackoffStrategy::Linear => initial * attempt as f64,
            BackoffStrategy::Exponential => {
                initial * self.backoff_factor.powi(attempt.saturating_sub(1) as i32)
            }
            BackoffStrategy::Jitter => {
                let base = initial * self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
                base * rand::rng().random_range(0.5..=1.5)
            }
        };

        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether an error of the given kind should be retried.
    pub fn should_retry(&self, kind: &str) -> bool {
        if self.non_retryable_errors.iter().any(|k| k == kind) {
            return false;
        }
        self.retryable_errors.is_empty() || self.retryable_errors.iter().any(|k| k == kind)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
