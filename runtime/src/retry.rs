//! Retry logic with bounded backoff for contended and transient failures.
//!
//! Unlike a blind retry, the caller classifies every failed attempt: an
//! [`Attempt::Retry`] is retried until the budget runs out, an
//! [`Attempt::Abort`] is returned immediately. The operation closure is
//! invoked afresh on every attempt, so callers rebuild their request from
//! current state instead of replaying a stale one.
//!
//! # Example
//!
//! ```rust
//! use prize_inventory_runtime::retry::{Attempt, RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(450))
//!     .multiplier(1.0)
//!     .jitter(Duration::from_millis(200))
//!     .build();
//!
//! let result = retry_with_backoff(&policy, |_attempt| async {
//!     Ok::<_, Attempt<String>>(42)
//! }).await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

use rand::Rng;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_retries`: 5
/// - `initial_delay`: 450ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 1.0 (constant delay)
/// - `jitter`: 200ms (uniform random extra delay)
///
/// With the defaults every retry sleeps between 450 and 650 ms.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier applied per retry
    pub multiplier: f64,
    /// Upper bound of the random extra delay added to every retry
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: None,
        }
    }

    /// Total attempts the policy allows, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic part of the delay before retry number `attempt`.
    ///
    /// `delay = initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Delay before retry number `attempt`, jitter included.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Set the upper bound of the random extra delay.
    #[must_use]
    pub const fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(5),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(450)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(5)),
            multiplier: self.multiplier.unwrap_or(1.0),
            jitter: self.jitter.unwrap_or(Duration::from_millis(200)),
        }
    }
}

/// Classification of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<E> {
    /// The failure may clear up; try again if the budget allows.
    Retry(E),
    /// Retrying cannot help; fail now.
    Abort(E),
}

/// Failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// An attempt was classified as [`Attempt::Abort`].
    Aborted(E),
    /// Every attempt was classified as [`Attempt::Retry`].
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the last attempt.
        last: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(err) => write!(f, "{err}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
        }
    }
}

/// Retry an async operation with bounded, jittered backoff.
///
/// `operation` receives the zero-based attempt number.
///
/// # Errors
///
/// - [`RetryError::Aborted`] as soon as an attempt aborts
/// - [`RetryError::Exhausted`] after `max_retries + 1` retryable failures
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, Attempt<E>>>,
    E: fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(Attempt::Abort(err)) => {
                tracing::debug!(attempt, error = %err, "Error is not retryable, failing immediately");
                return Err(RetryError::Aborted(err));
            }
            Err(Attempt::Retry(err)) => {
                if attempt >= policy.max_retries {
                    tracing::error!(attempt, error = %err, "Operation failed after max retries");
                    return Err(RetryError::Exhausted {
                        attempts: attempt + 1,
                        last: err,
                    });
                }

                let delay = policy.jittered_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
