//! Timing primitives for Sessionward.
//!
//! Three small tools that keep a client from hammering its auth backend:
//!
//! - [`Cooldown`]: "don't do this again within N ms", with an adaptive
//!   interval that can be escalated when the backend throttles us.
//! - [`retry`]: run an async operation up to `max_attempts` times with
//!   exponential delay, asking a predicate whether each failure is worth
//!   another try.
//! - [`SingleFlight`]: collapse concurrent calls into one shared execution.
//!
//! # Time source
//!
//! Everything measures time with `tokio::time::Instant` and sleeps with
//! `tokio::time::sleep`, so tests can run under a paused clock
//! (`#[tokio::test(start_paused = true)]`) and advance it explicitly.

mod cooldown;
mod retry;
mod single_flight;

pub use cooldown::Cooldown;
pub use retry::{RetryError, RetryPolicy, retry};
pub use single_flight::SingleFlight;
