//! Integration tests for the event bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sessionward_events::EventBus;
use sessionward_protocol::{AuthEvent, AuthEventKind, Session};

// =========================================================================
// Helpers
// =========================================================================

/// A listener that appends `(tag, kind)` to a shared log.
fn recorder(
    log: &Arc<Mutex<Vec<(&'static str, AuthEventKind)>>>,
    tag: &'static str,
) -> impl Fn(&AuthEvent) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |event: &AuthEvent| log.lock().unwrap().push((tag, event.kind))
}

// =========================================================================
// Delivery
// =========================================================================

#[test]
fn test_listeners_run_in_registration_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.add_event_listener(recorder(&log, "first"));
    bus.add_event_listener(recorder(&log, "second"));
    bus.add_event_listener(recorder(&log, "third"));

    let delivered = bus.notify_listeners(AuthEventKind::SignedOut, None);

    assert_eq!(delivered, 3);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("first", AuthEventKind::SignedOut),
            ("second", AuthEventKind::SignedOut),
            ("third", AuthEventKind::SignedOut),
        ]
    );
}

#[test]
fn test_listener_receives_session_payload() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    bus.add_event_listener(move |event| {
        *sink.lock().unwrap() = event.session.clone();
    });

    let session = Session::new("a.b.c", "r1", Some(42));
    bus.notify_listeners(AuthEventKind::SignedIn, Some(session.clone()));

    assert_eq!(*seen.lock().unwrap(), Some(session));
}

#[test]
fn test_panicking_listener_does_not_block_later_listeners() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.add_event_listener(|_| panic!("listener A is broken"));
    bus.add_event_listener(recorder(&log, "B"));
    let before = bus.listener_count();

    let delivered = bus.notify_listeners(AuthEventKind::TokenRefreshed, None);

    assert_eq!(delivered, 1);
    assert_eq!(*log.lock().unwrap(), vec![("B", AuthEventKind::TokenRefreshed)]);
    assert_eq!(bus.listener_count(), before);
}

#[test]
fn test_panicking_listener_keeps_receiving_later_events() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.add_event_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        panic!("always fails");
    });

    bus.notify_listeners(AuthEventKind::SignedIn, None);
    bus.notify_listeners(AuthEventKind::SignedOut, None);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// =========================================================================
// Registration
// =========================================================================

#[test]
fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sub = bus.add_event_listener(recorder(&log, "gone"));
    bus.add_event_listener(recorder(&log, "kept"));

    assert!(sub.unsubscribe());
    bus.notify_listeners(AuthEventKind::SignedIn, None);

    assert_eq!(*log.lock().unwrap(), vec![("kept", AuthEventKind::SignedIn)]);
}

#[test]
fn test_unsubscribe_after_clear_returns_false() {
    let bus = EventBus::new();
    let sub = bus.add_event_listener(|_| {});

    bus.clear_listeners();

    assert_eq!(bus.listener_count(), 0);
    assert!(!sub.unsubscribe());
}

#[test]
fn test_unsubscribe_after_bus_dropped_returns_false() {
    let bus = EventBus::new();
    let sub = bus.add_event_listener(|_| {});
    drop(bus);
    assert!(!sub.unsubscribe());
}

#[test]
fn test_clones_share_one_registry() {
    let bus = EventBus::new();
    let other = bus.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    other.add_event_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.notify_listeners(AuthEventKind::UserUpdated, None);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_added_during_publish_sees_next_event_only() {
    let bus = EventBus::new();
    let late_calls = Arc::new(AtomicUsize::new(0));

    let handle = bus.clone();
    let counter = Arc::clone(&late_calls);
    let added = Arc::new(AtomicUsize::new(0));
    bus.add_event_listener(move |_| {
        if added.fetch_add(1, Ordering::SeqCst) == 0 {
            let counter = Arc::clone(&counter);
            handle.add_event_listener(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    bus.notify_listeners(AuthEventKind::SignedIn, None);
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    bus.notify_listeners(AuthEventKind::SignedIn, None);
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}
