//! Retry with a fixed pause between attempts.
//!
//! Only errors the caller marks as retryable are retried; everything else is
//! returned from the first attempt.
//!
//! # Example
//!
//! ```rust
//! use taskstore_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
//!
//! let result = retry_with_predicate(
//!     policy,
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("transient"),
//! )
//! .await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// How often to retry and how long to wait in between
///
/// Defaults to 3 retries one second apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Pause before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Retry `max_retries` times, sleeping `delay` before each retry
    #[must_use]
    pub const fn fixed(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Retry `operation` while `is_retryable` accepts the error
///
/// # Errors
///
/// Returns the first non-retryable error, or the error of the final attempt
/// once retries are used up.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(retries, "Succeeded after retry");
                }
                return Ok(value);
            },
            Err(error) if !is_retryable(&error) => {
                tracing::debug!(%error, "Not retryable");
                return Err(error);
            },
            Err(error) if retries >= policy.max_retries => {
                tracing::error!(retries, %error, "Giving up after retries");
                return Err(error);
            },
            Err(error) => {
                retries += 1;
                tracing::warn!(
                    retry = retries,
                    of = policy.max_retries,
                    delay_ms = policy.delay.as_millis(),
                    %error,
                    "Attempt failed, retrying"
                );
                sleep(policy.delay).await;
            },
        }
    }
}
