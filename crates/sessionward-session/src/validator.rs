//! Expiry checks and cooled-down, coalesced token refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use sessionward_protocol::{AuthBackend, BackendError, Session};
use sessionward_throttle::{Cooldown, RetryError, SingleFlight, retry};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::SessionConfig;

type RefreshResult = Result<Option<Session>, BackendError>;

/// Decides whether a session's access token is usable, refreshing it when
/// it has expired.
///
/// ## Refresh path
///
/// ```text
/// expired ──→ cooling down? ── yes ──→ false
///                  │ no
///                  ▼
///             mark cooldown ──→ retry(refresh) ──→ rate limited? ── yes ──→ cooldown × 2 (capped)
///                                     │
///                                     ▼
///                           new session? ── true / false
/// ```
///
/// Concurrent refreshes share one in-flight request. The cooldown interval
/// only ever grows; it resets when the process restarts.
pub struct TokenValidator<B> {
    backend: Arc<B>,
    config: SessionConfig,
    cooldown: Arc<Mutex<Cooldown>>,
    flight: SingleFlight<RefreshResult>,
}

impl<B: AuthBackend> TokenValidator<B> {
    pub fn new(backend: Arc<B>, config: SessionConfig) -> Self {
        let cooldown = Cooldown::new(config.refresh_cooldown());
        Self {
            backend,
            config,
            cooldown: Arc::new(Mutex::new(cooldown)),
            flight: SingleFlight::new(),
        }
    }

    /// Current minimum gap between refresh attempts.
    pub fn refresh_cooldown(&self) -> Duration {
        lock(&self.cooldown).interval()
    }

    /// When the last refresh attempt started.
    pub fn last_refresh_attempt(&self) -> Option<Instant> {
        lock(&self.cooldown).last()
    }

    /// `true` when `session` holds two tokens and the access token expires
    /// strictly after now, or when an expired token was refreshed
    /// successfully.
    ///
    /// Never fails: every error ends up as `false` in the log.
    pub async fn validate_token(&self, session: Option<&Session>) -> bool {
        let Some(session) = session else {
            debug!("no session to validate");
            return false;
        };
        if !session.has_tokens() {
            debug!(
                has_access_token = !session.access_token.is_empty(),
                has_refresh_token = !session.refresh_token.is_empty(),
                "session is missing a token"
            );
            return false;
        }

        let now = Utc::now().timestamp();
        match session.expiry() {
            Some(exp) if exp > now => {
                trace!(expires_in_secs = exp - now, "access token valid");
                return true;
            }
            Some(exp) => {
                debug!(expired_secs_ago = now - exp, "access token expired");
            }
            None => {
                debug!("access token has no readable expiry, treating as expired");
            }
        }

        {
            let mut cooldown = lock(&self.cooldown);
            if let Some(remaining) = cooldown.remaining() {
                debug!(
                    remaining_ms = remaining.as_millis() as u64,
                    interval_ms = cooldown.interval().as_millis() as u64,
                    "refresh cooling down, skipping"
                );
                return false;
            }
            cooldown.mark();
        }

        match self.refresh().await {
            Ok(Some(fresh)) if fresh.has_tokens() => {
                info!(expires_at = ?fresh.expiry(), "access token refreshed");
                true
            }
            Ok(_) => {
                warn!("refresh returned no session");
                false
            }
            Err(e) => {
                warn!(error = %e, "refresh failed");
                false
            }
        }
    }

    /// Refreshes through the backend with the configured retry policy.
    ///
    /// Callers that arrive while a refresh is running get its result rather
    /// than starting another one. Does not consult the cooldown.
    pub async fn refresh(&self) -> RefreshResult {
        let backend = Arc::clone(&self.backend);
        let cooldown = Arc::clone(&self.cooldown);
        let policy = self.config.refresh_retry_policy();
        let ceiling = self.config.max_refresh_cooldown();

        self.flight
            .run(move || async move {
                let throttled = AtomicBool::new(false);
                let result = retry(
                    &policy,
                    |attempt| {
                        debug!(attempt, "refreshing session");
                        backend.refresh_session()
                    },
                    |e: &BackendError| {
                        if e.is_rate_limited() {
                            throttled.store(true, Ordering::Relaxed);
                        }
                        e.is_retryable()
                    },
                )
                .await;

                if throttled.load(Ordering::Relaxed) {
                    let interval = lock(&cooldown).escalate(ceiling);
                    warn!(
                        cooldown_ms = interval.as_millis() as u64,
                        "rate limited during refresh, backing off"
                    );
                }
                result.map_err(RetryError::into_inner)
            })
            .await
    }
}

fn lock(cooldown: &Mutex<Cooldown>) -> MutexGuard<'_, Cooldown> {
    cooldown.lock().unwrap_or_else(PoisonError::into_inner)
}
