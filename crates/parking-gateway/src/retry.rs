//! # Retry Policy
//!
//! Bounded, jittered exponential backoff around whole engine operations.
//!
//! ## Attempt Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  attempt 1 ──► Ok ───────────────────────────────────────► return Ok    │
//! │      │                                                                  │
//! │      ├──► Err (ZoneFull, AlreadyParked, ...) ────────────► return Err   │
//! │      │                                                                  │
//! │      └──► Err (Conflict / StoreUnavailable)                             │
//! │               │                                                         │
//! │               ├── attempts left? ── no ──────────────────► return Err   │
//! │               │                                                         │
//! │               ▼ yes                                                     │
//! │           sleep(next_backoff)  25ms → 50ms → 100ms ... ≤ 500ms, jittered  │
//! │               │                                                         │
//! │               ▼                                                         │
//! │  attempt 2 (fresh transaction, fresh reads)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each attempt is a brand new engine call, so a retry never reuses state
//! read by the attempt that lost.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use parking_db::EngineResult;
use tracing::{debug, warn};

use crate::config::RetrySettings;

/// How many times, and how patiently, to re-run a retryable operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            initial_interval: Duration::from_millis(settings.initial_interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            multiplier: settings.multiplier,
            randomization_factor: settings.randomization_factor,
        }
    }

    /// A single attempt; errors are returned as they are.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fresh backoff schedule for one request.
    ///
    /// The attempt count bounds the loop, so the schedule itself never
    /// gives up on elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails for good, or attempts run out.
    ///
    /// Only errors whose `is_retryable()` is true are attempted again.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = backoff.next_backoff().unwrap_or(self.max_interval);
                    debug!(
                        operation,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Giving up after max attempts"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}
