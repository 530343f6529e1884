// ABOUTME: Exponential-backoff retry wrapper for startup-only connection establishment
// ABOUTME: Base 1s delay, x2 multiplier, 30s cap, five attempts by default
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub delay: Duration,
    /// Upper bound on the delay
    pub max_delay: Duration,
    /// Delay growth factor
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Run `operation` until it succeeds or the attempt budget is exhausted,
/// sleeping with exponential backoff in between.
///
/// # Errors
/// Returns the last error once every attempt has failed
pub async fn with_backoff<T, E, F, Fut>(
    name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut current_delay = config.delay;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < config.max_attempts {
                    warn!(
                        "{name} failed (attempt {attempt}/{}), retrying in {:.1}s: {err}",
                        config.max_attempts,
                        current_delay.as_secs_f64()
                    );
                    tokio::time::sleep(current_delay).await;
                    current_delay = current_delay
                        .mul_f64(config.multiplier)
                        .min(config.max_delay);
                }
                last_error = Some(err);
            }
        }
    }

    error!("reached max retry attempts for {name}");
    // max_attempts >= 1, so at least one error was recorded.
    Err(last_error.expect("retry loop ran at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_backoff("test", fast_config(5), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = with_backoff("test", fast_config(3), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        assert_eq!(result, Err("down"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
