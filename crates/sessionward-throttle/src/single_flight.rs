//! Call coalescing: one execution, many waiters.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Shares a single in-flight future among every concurrent caller.
///
/// The first caller of [`run`](Self::run) starts the work; anyone who calls
/// while it is still pending awaits the same future and gets a clone of its
/// output. Once it resolves, the slot is emptied and the next call starts
/// fresh work.
///
/// A caller that is dropped mid-await does not cancel the work: any other
/// waiter (or the next caller) keeps driving the same shared future.
pub struct SingleFlight<T> {
    slot: Mutex<Option<Flight<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a shared execution is pending.
    pub fn in_flight(&self) -> bool {
        self.lock().is_some()
    }

    /// Joins the pending execution, or starts one with `make`.
    ///
    /// `make` is only called when nothing is in flight.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some(pending) => {
                    tracing::trace!("joining in-flight call");
                    pending.clone()
                }
                None => {
                    let started = make().boxed().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let output = flight.clone().await;

        let mut slot = self.lock();
        if slot
            .as_ref()
            .is_some_and(|current| Shared::ptr_eq(current, &flight))
        {
            *slot = None;
        }
        output
    }

    fn lock(&self) -> MutexGuard<'_, Option<Flight<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
