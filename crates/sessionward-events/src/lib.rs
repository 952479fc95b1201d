//! Auth event fan-out for Sessionward.
//!
//! The [`EventBus`] is a synchronous publish/subscribe registry. Every
//! listener receives every event published after it registered, in
//! registration order, until it unsubscribes. A listener that panics is
//! logged and skipped; it neither stops delivery to the listeners after it
//! nor changes the registry.
//!
//! Delivery is best-effort: nothing is queued, retried or persisted.

mod bus;

pub use bus::{EventBus, Listener, ListenerId, Subscription};
