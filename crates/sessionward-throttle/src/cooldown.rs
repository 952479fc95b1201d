//! Minimum-interval throttle with adaptive backoff.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Tracks when an operation last ran and whether it may run again.
///
/// The window is `[last, last + interval)`: a call exactly `interval` after
/// the last one is allowed. An interval of zero never cools.
///
/// ```text
///   mark() ──→ cooling for `interval` ──→ ready ──→ mark() ...
///                     │
///                escalate(max): interval = min(interval × 2, max)
/// ```
#[derive(Debug, Clone)]
pub struct Cooldown {
    interval: Duration,
    last: Option<Instant>,
}

impl Cooldown {
    /// Creates a cooldown that has never been marked (so it starts ready).
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// The current window length.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When [`mark`](Self::mark) was last called.
    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// Time since the last mark.
    pub fn elapsed(&self) -> Option<Duration> {
        self.last.map(|t| t.elapsed())
    }

    /// `true` while inside the window opened by the last mark.
    pub fn is_cooling(&self) -> bool {
        self.remaining().is_some()
    }

    /// How much of the window is left, or `None` when ready.
    pub fn remaining(&self) -> Option<Duration> {
        let elapsed = self.elapsed()?;
        self.interval.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Opens a new window starting now.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }

    /// Forgets the last mark, ending any active window. The interval is
    /// kept.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Doubles the interval, capped at `max`. Returns the new interval.
    ///
    /// An interval of zero stays zero (there is nothing to double).
    pub fn escalate(&mut self, max: Duration) -> Duration {
        let previous = self.interval;
        self.interval = self.interval.saturating_mul(2).min(max);
        debug!(
            previous_ms = previous.as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "cooldown escalated"
        );
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reset_ends_window_and_keeps_interval() {
        let mut c = Cooldown::new(Duration::from_secs(5));
        c.mark();
        assert!(c.is_cooling());

        c.reset();

        assert!(!c.is_cooling());
        assert_eq!(c.last(), None);
        assert_eq!(c.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_new_cooldown_is_ready() {
        let c = Cooldown::new(Duration::from_secs(5));
        assert!(!c.is_cooling());
        assert_eq!(c.last(), None);
        assert_eq!(c.remaining(), None);
    }

    #[test]
    fn test_escalate_doubles_until_cap() {
        let mut c = Cooldown::new(Duration::from_millis(5_000));
        let max = Duration::from_millis(30_000);

        assert_eq!(c.escalate(max), Duration::from_millis(10_000));
        assert_eq!(c.escalate(max), Duration::from_millis(20_000));
        assert_eq!(c.escalate(max), Duration::from_millis(30_000));
        assert_eq!(c.escalate(max), Duration::from_millis(30_000));
    }

    #[test]
    fn test_escalate_zero_interval_stays_zero() {
        let mut c = Cooldown::new(Duration::ZERO);
        assert_eq!(c.escalate(Duration::from_secs(30)), Duration::ZERO);
    }
}
