//! Bounded retry with exponential delay.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How many times to try, and how long to wait in between.
///
/// The wait after failed attempt `n` (1-based) is
/// `min(base_delay × 2^(n-1), max_delay)` plus a random `0..=jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra delay. Zero disables jitter.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Attempts actually made, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter.is_zero() {
            return backoff;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = rand::rng().random_range(0..=jitter_ms);
        backoff + Duration::from_millis(extra)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why [`retry`] gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with an error the predicate considered
    /// retryable.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The predicate declined to retry this error.
    #[error("attempt {attempt} failed and is not retryable: {error}")]
    Aborted {
        attempt: u32,
        #[source]
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The error from the final attempt.
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Runs `op` until it succeeds, the predicate rejects an error, or the
/// policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. `should_retry` is consulted on
/// every failure, including the last one, so callers can observe each error
/// (for example to notice a rate-limit response) even when no retry follows.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !should_retry(&error) {
            debug!(attempt, error = %error, "error is not retryable");
            return Err(RetryError::Aborted { attempt, error });
        }
        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %error, "retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
