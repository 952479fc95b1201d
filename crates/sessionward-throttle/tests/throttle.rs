//! Integration tests for cooldowns, retry and call coalescing.
//!
//! Time-dependent tests run with a paused clock: `sleep` resolves as soon
//! as the runtime is idle, and `advance` moves the clock explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::future::{join, join_all};
use sessionward_throttle::{Cooldown, RetryError, RetryPolicy, SingleFlight, retry};
use tokio::time::{Instant, advance};

// =========================================================================
// Cooldown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cooldown_window_closes_exactly_at_interval() {
    let mut c = Cooldown::new(Duration::from_millis(5_000));
    c.mark();
    assert!(c.is_cooling());

    advance(Duration::from_millis(4_999)).await;
    assert!(c.is_cooling());
    assert_eq!(c.remaining(), Some(Duration::from_millis(1)));

    advance(Duration::from_millis(1)).await;
    assert!(!c.is_cooling());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_zero_interval_never_cools() {
    let mut c = Cooldown::new(Duration::ZERO);
    c.mark();
    assert!(!c.is_cooling());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_escalation_lengthens_current_window() {
    let mut c = Cooldown::new(Duration::from_millis(5_000));
    c.mark();
    c.escalate(Duration::from_millis(30_000));

    advance(Duration::from_millis(6_000)).await;
    assert!(c.is_cooling());

    advance(Duration::from_millis(4_000)).await;
    assert!(!c.is_cooling());
}

// =========================================================================
// retry
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Fault {
    Throttled,
    Fatal,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled => f.write_str("throttled"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

impl std::error::Error for Fault {}

fn policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(2_000))
}

#[tokio::test(start_paused = true)]
async fn test_retry_first_success_does_not_sleep() {
    let start = Instant::now();
    let calls = AtomicU32::new(0);

    let result: Result<u32, RetryError<Fault>> = retry(
        &policy(),
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        },
        |_| true,
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_on_second_attempt_after_base_delay() {
    let start = Instant::now();

    let result = retry(
        &policy(),
        |attempt| async move {
            if attempt == 1 {
                Err(Fault::Throttled)
            } else {
                Ok(attempt)
            }
        },
        |e| *e == Fault::Throttled,
    )
    .await;

    assert_eq!(result.unwrap(), 2);
    assert!(start.elapsed() >= Duration::from_millis(2_000));
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhausted_after_max_attempts() {
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = retry(
        &policy(),
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Fault::Throttled) }
        },
        |_| true,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    match result {
        Err(RetryError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last, Fault::Throttled);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_non_retryable_aborts_immediately() {
    let start = Instant::now();
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = retry(
        &policy(),
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Fault::Fatal) }
        },
        |e| *e == Fault::Throttled,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(matches!(
        result,
        Err(RetryError::Aborted {
            attempt: 1,
            error: Fault::Fatal
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_retry_predicate_sees_every_failure() {
    let seen = AtomicU32::new(0);

    let _: Result<(), _> = retry(
        &RetryPolicy::new(3, Duration::from_millis(10)),
        |_| async { Err(Fault::Throttled) },
        |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        },
    )
    .await;

    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

// =========================================================================
// SingleFlight
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_single_flight_concurrent_callers_share_one_execution() {
    let flight = SingleFlight::new();
    let executions = Arc::new(AtomicU32::new(0));

    let make = || {
        let executions = Arc::clone(&executions);
        move || async move {
            executions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            42u32
        }
    };

    let results = join_all((0..5).map(|_| flight.run(make()))).await;

    assert_eq!(results, vec![42; 5]);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(!flight.in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_new_call_after_completion_runs_again() {
    let flight = SingleFlight::new();
    let executions = Arc::new(AtomicU32::new(0));

    for expected in 1..=2 {
        let counter = Arc::clone(&executions);
        let value = flight
            .run(move || async move { counter.fetch_add(1, Ordering::SeqCst) + 1 })
            .await;
        assert_eq!(value, expected);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_second_closure_ignored_while_pending() {
    let flight = SingleFlight::new();

    let (a, b) = join(
        flight.run(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "first"
        }),
        flight.run(|| async { "second" }),
    )
    .await;

    assert_eq!(a, "first");
    assert_eq!(b, "first");
}
