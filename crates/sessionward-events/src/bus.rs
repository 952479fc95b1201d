use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sessionward_protocol::{AuthEvent, AuthEventKind, Session};
use tracing::{debug, error, trace};

/// A registered callback.
pub type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// Identifies one registration on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// A typed publish/subscribe registry for [`AuthEvent`]s.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every subsequent event.
    ///
    /// Dropping the returned [`Subscription`] keeps the listener registered;
    /// call [`Subscription::unsubscribe`] to remove it.
    pub fn add_event_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().push((id, Arc::new(listener)));
        debug!(listener = %id, "event listener added");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Removes the listener registered as `id`. Returns `false` if it was
    /// not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.remove(id)
    }

    /// Builds an event from `kind` and `session` and publishes it.
    pub fn notify_listeners(&self, kind: AuthEventKind, session: Option<Session>) -> usize {
        self.publish(&AuthEvent::new(kind, session))
    }

    /// Calls every listener with `event`, in registration order.
    ///
    /// Listeners run outside the registry lock, so they may add or remove
    /// listeners; such changes apply from the next publish. Returns the
    /// number of listeners that returned normally.
    pub fn publish(&self, event: &AuthEvent) -> usize {
        let snapshot: Vec<(ListenerId, Listener)> = self
            .inner
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        trace!(kind = %event.kind, listeners = snapshot.len(), "publishing auth event");

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        listener = %id,
                        kind = %event.kind,
                        panic = panic_message(payload.as_ref()),
                        "event listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Removes every listener.
    pub fn clear_listeners(&self) {
        let removed = {
            let mut listeners = self.inner.lock();
            let n = listeners.len();
            listeners.clear();
            n
        };
        debug!(removed, "event listeners cleared");
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Handle returned by [`EventBus::add_event_listener`].
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Returns `false` if it was already removed
    /// (for example by [`EventBus::clear_listeners`]) or the bus is gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(self.id),
            None => false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
