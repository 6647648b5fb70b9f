// src/retry.rs

//! Retry with exponential backoff for remote calls.
//!
//! Every call to the remote service goes through [`RetryPolicy::execute`].
//! Transient failures (see [`RemoteError::is_transient`]) are retried after a
//! growing delay; anything else is surfaced immediately. The policy holds no
//! state between calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{RefreshError, RemoteError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// Range of random extra delay added to each step.
    pub jitter: (Duration, Duration),
    pub is_transient: fn(&RemoteError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 42,
            initial_delay: Duration::from_millis(500),
            backoff_factor: std::f64::consts::SQRT_2,
            max_delay: Duration::from_secs(60),
            jitter: (Duration::ZERO, Duration::from_millis(500)),
            is_transient: RemoteError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries `max_attempts` times with a fixed delay and no jitter.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff_factor: 1.0,
            max_delay: delay,
            jitter: (Duration::ZERO, Duration::ZERO),
            is_transient: RemoteError::is_transient,
        }
    }

    /// Run `call` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// `operation` names the call in logs and errors, e.g. `"list tasks"`.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "remote call succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(source) if !(self.is_transient)(&source) => {
                    return Err(RefreshError::Remote {
                        operation: operation.to_string(),
                        source,
                    });
                }
                Err(source) if attempt >= self.max_attempts => {
                    return Err(RefreshError::RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    delay = self.next_delay(delay);
                }
            }
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        // Products too large for a `Duration` saturate at the cap.
        let scaled = Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        scaled.saturating_add(self.sample_jitter()).min(self.max_delay)
    }

    fn sample_jitter(&self) -> Duration {
        let (low, high) = self.jitter;
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}
