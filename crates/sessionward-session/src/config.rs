//! Timing configuration for the session layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionward_throttle::RetryPolicy;
use tracing::warn;

/// Cooldowns and retry limits, in milliseconds.
///
/// Every field has a default, so a partial JSON object (or `{}`) is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Window during which [`check_session`](crate::SessionManager::check_session)
    /// answers from its cached result. Default: 2000.
    pub check_cooldown_ms: u64,

    /// Minimum gap between refresh attempts. Default: 5000.
    pub refresh_cooldown_ms: u64,

    /// Ceiling for the refresh cooldown after rate-limit backoff.
    /// Default: 30000.
    pub max_refresh_cooldown_ms: u64,

    /// Attempts per refresh, including the first. Default: 2.
    pub refresh_max_attempts: u32,

    /// Delay before the second refresh attempt; doubles after that.
    /// Default: 2000.
    pub refresh_base_delay_ms: u64,

    /// Random extra delay added to each retry. Default: 0.
    pub refresh_jitter_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            check_cooldown_ms: 2_000,
            refresh_cooldown_ms: 5_000,
            max_refresh_cooldown_ms: 30_000,
            refresh_max_attempts: 2,
            refresh_base_delay_ms: 2_000,
            refresh_jitter_ms: 0,
        }
    }
}

impl SessionConfig {
    /// Fixes values that would make the session layer misbehave.
    ///
    /// - `refresh_max_attempts` of 0 becomes 1.
    /// - `max_refresh_cooldown_ms` is raised to at least `refresh_cooldown_ms`.
    pub fn validated(mut self) -> Self {
        if self.refresh_max_attempts == 0 {
            warn!("refresh_max_attempts is 0, using 1");
            self.refresh_max_attempts = 1;
        }
        if self.max_refresh_cooldown_ms < self.refresh_cooldown_ms {
            warn!(
                max = self.max_refresh_cooldown_ms,
                base = self.refresh_cooldown_ms,
                "max_refresh_cooldown_ms below refresh_cooldown_ms, raising it"
            );
            self.max_refresh_cooldown_ms = self.refresh_cooldown_ms;
        }
        self
    }

    pub fn check_cooldown(&self) -> Duration {
        Duration::from_millis(self.check_cooldown_ms)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_millis(self.refresh_cooldown_ms)
    }

    pub fn max_refresh_cooldown(&self) -> Duration {
        Duration::from_millis(self.max_refresh_cooldown_ms)
    }

    /// The retry policy applied to each refresh.
    pub fn refresh_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.refresh_max_attempts,
            Duration::from_millis(self.refresh_base_delay_ms),
        )
        .with_max_delay(self.max_refresh_cooldown())
        .with_jitter(Duration::from_millis(self.refresh_jitter_ms))
    }
}
