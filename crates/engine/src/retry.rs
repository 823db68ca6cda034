// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async retry executor over [`RetryConfig`].
//!
//! Invokes the operation up to `max_retries + 1` times. The hook fires
//! before each backoff sleep — the orchestrator uses it to record
//! `RETRY_ATTEMPTED` events. Both the in-flight operation and the sleeps
//! race against the cancellation token.

use crate::cancel::CancelToken;
use fm_core::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Why a retried operation ultimately did not produce a value.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// A non-retryable error, or retries were exhausted; carries the last
    /// error observed.
    Error(E),
    /// Cancellation interrupted the operation or a pending delay.
    Cancelled,
}

/// Run `operation` with bounded retries.
///
/// `should_retry` classifies errors; `on_retry(attempt, error, delay)` is
/// called before each sleep. With `max_retries = 0` the operation runs
/// exactly once.
pub async fn execute_with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancelToken,
    should_retry: impl Fn(&E) -> bool,
    mut on_retry: impl FnMut(u32, &E, Duration),
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total_attempts = config.max_retries + 1;
    let mut last_error = None;

    for attempt in 1..=total_attempts {
        let result = tokio::select! {
            result = operation() => result,
            _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !should_retry(&err) {
                    return Err(RetryFailure::Error(err));
                }

                if attempt < total_attempts {
                    let delay = config.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = config.max_retries,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying",
                    );
                    on_retry(attempt, &err, delay);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
                    }
                } else {
                    error!(
                        attempts = total_attempts,
                        error = %err,
                        "all attempts failed",
                    );
                }
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) => Err(RetryFailure::Error(err)),
        // Unreachable: the loop always records an error before falling
        // through, but avoid panicking on the impossible path.
        None => Err(RetryFailure::Cancelled),
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
