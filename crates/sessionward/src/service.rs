//! The auth service: one object the application holds for the whole session
//! lifecycle.
//!
//! The service ties the layers together:
//!
//! ```text
//! backend notifications ──→ internal handling ──→ cache ──→ EventBus listeners
//!                           (clear / repair)
//! ```
//!
//! Internal handling always finishes before listeners are called, so a
//! listener never sees storage or the cached session half-updated.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use sessionward_events::{EventBus, Subscription};
use sessionward_protocol::{
    AuthBackend, AuthEvent, AuthEventKind, FederatedProvider, Session, SignUpOutcome, User,
};
use sessionward_session::{SessionInfo, SessionManager, StorageRepair};
use sessionward_store::{KeyValueStore, StoreAdapter};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AuthConfig, AuthError, AuthOperations, SignOutOrchestrator, SignOutReport};

#[derive(Default)]
struct Cached {
    user: Option<User>,
    session: Option<Session>,
}

/// State shared between the service and its notification task.
struct Shared<B, S> {
    manager: SessionManager<B, S>,
    repair: StorageRepair<S>,
    store: StoreAdapter<S>,
    bus: EventBus,
    cached: Mutex<Cached>,
}

impl<B, S> Shared<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    fn cached(&self) -> MutexGuard<'_, Cached> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_session(&self, session: Option<Session>) {
        let mut cached = self.cached();
        cached.user = session.as_ref().and_then(Session::derive_user);
        cached.session = session;
    }

    /// Handles one backend notification, then republishes it.
    fn handle_notification(&self, event: AuthEvent) {
        debug!(kind = %event.kind, has_session = event.session.is_some(), "auth notification");
        match event.kind {
            AuthEventKind::SignedOut => {
                self.store.clear_auth_data();
                self.manager.invalidate();
                self.set_session(None);
            }
            AuthEventKind::SignedIn => {
                self.repair.repair_storage();
                self.manager.invalidate();
                self.set_session(event.session.clone());
            }
            AuthEventKind::TokenRefreshed => {
                self.repair.repair_storage();
                self.set_session(event.session.clone());
            }
            AuthEventKind::UserUpdated | AuthEventKind::PasswordRecovery => {
                if event.session.is_some() {
                    self.set_session(event.session.clone());
                }
            }
            AuthEventKind::Error => {}
        }
        self.bus.publish(&event);
    }
}

/// Session lifecycle façade.
///
/// Construct one with [`AuthService::init`] at start-up and call
/// [`destroy`](Self::destroy) (or drop it) at shutdown. Every collaborator
/// is passed in, so tests build isolated instances.
///
/// `init` spawns the notification task and must run inside a Tokio runtime.
pub struct AuthService<B, S> {
    backend: Arc<B>,
    config: Arc<AuthConfig>,
    shared: Arc<Shared<B, S>>,
    operations: AuthOperations<B, S>,
    sign_out: SignOutOrchestrator<B, S>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<B, S> AuthService<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    /// Validates `config`, wires the components together and subscribes to
    /// the backend's notifications.
    ///
    /// The cache starts from whatever session record is already stored.
    pub fn init(config: AuthConfig, backend: Arc<B>, store: S) -> Result<Self, AuthError> {
        config.validate()?;
        let config = Arc::new(config);
        let store = StoreAdapter::new(store, config.storage.clone());

        let shared = Arc::new(Shared {
            manager: SessionManager::new(
                Arc::clone(&backend),
                store.clone(),
                config.session.clone(),
            ),
            repair: StorageRepair::new(store.clone()),
            store: store.clone(),
            bus: EventBus::new(),
            cached: Mutex::new(Cached::default()),
        });
        let stored = store
            .canonical()
            .and_then(|text| Session::from_record(&text).ok());
        shared.set_session(stored);

        let receiver = backend.subscribe();
        let handle = tokio::spawn(listen(receiver, Arc::clone(&shared)));

        info!(site_url = %config.site_url, storage_key = %config.storage.canonical, "auth service initialized");

        Ok(Self {
            operations: AuthOperations::new(
                Arc::clone(&backend),
                store.clone(),
                Arc::clone(&config),
            ),
            sign_out: SignOutOrchestrator::new(Arc::clone(&backend), store),
            backend,
            config,
            shared,
            listener: Mutex::new(Some(handle)),
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session_manager(&self) -> &SessionManager<B, S> {
        &self.shared.manager
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// The cached user. Never contacts the backend.
    pub fn get_user(&self) -> Option<User> {
        self.shared.cached().user.clone()
    }

    /// The cached session. Never contacts the backend.
    pub fn get_session(&self) -> Option<Session> {
        self.shared.cached().session.clone()
    }

    /// Whether a usable session exists, answered from cache inside the
    /// check cooldown.
    pub async fn check_session(&self) -> bool {
        self.shared.manager.check_session().await
    }

    pub fn get_session_info(&self) -> SessionInfo {
        self.shared.manager.get_session_info()
    }

    /// Repairs storage and confirms the result with the backend.
    pub async fn repair_session(&self) -> bool {
        let recovered = self
            .shared
            .manager
            .recovery()
            .attempt_session_recovery()
            .await;
        if recovered {
            let stored = self
                .shared
                .store
                .canonical()
                .and_then(|text| Session::from_record(&text).ok());
            self.shared.set_session(stored);
        }
        recovered
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.operations.sign_in(email, password).await?;
        self.shared.manager.invalidate();
        self.shared.set_session(Some(session.clone()));
        Ok(session)
    }

    /// Returns the Google authorization URL to open.
    pub async fn sign_in_with_google(&self) -> Result<String, AuthError> {
        self.operations
            .sign_in_with_provider(FederatedProvider::Google)
            .await
    }

    /// Returns the Microsoft authorization URL to open.
    pub async fn sign_in_with_microsoft(&self) -> Result<String, AuthError> {
        self.operations
            .sign_in_with_provider(FederatedProvider::Microsoft)
            .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        user_data: Value,
    ) -> Result<SignUpOutcome, AuthError> {
        self.operations.sign_up(email, password, user_data).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.operations.reset_password(email).await
    }

    /// Signs out locally and remotely, then announces `SIGNED_OUT` once.
    ///
    /// Local state is clean afterwards even if the backend is unreachable.
    pub async fn sign_out(&self) -> SignOutReport {
        let report = self.sign_out.sign_out().await;
        self.shared.handle_notification(AuthEvent::signed_out());
        report
    }

    /// Last-resort cleanup for a session nothing else can repair.
    pub async fn reset_auth_system(&self) {
        self.sign_out.reset_auth_system().await;
        self.shared.handle_notification(AuthEvent::signed_out());
    }

    pub fn add_event_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.shared.bus.add_event_listener(listener)
    }

    /// Stops handling backend notifications and removes every listener.
    pub fn destroy(&self) {
        if let Some(handle) = self.take_listener() {
            handle.abort();
        }
        self.shared.bus.clear_listeners();
        info!("auth service destroyed");
    }

    /// Whether backend notifications are still being handled.
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn take_listener(&self) -> Option<JoinHandle<()>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<B, S> Drop for AuthService<B, S> {
    fn drop(&mut self) {
        let handle = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Forwards backend notifications, in delivery order, until the backend
/// closes the channel.
async fn listen<B, S>(mut receiver: broadcast::Receiver<AuthEvent>, shared: Arc<Shared<B, S>>)
where
    B: AuthBackend,
    S: KeyValueStore,
{
    loop {
        match receiver.recv().await {
            Ok(event) => shared.handle_notification(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth notifications dropped, listeners may be stale");
                shared.handle_notification(AuthEvent::error());
            }
            Err(RecvError::Closed) => {
                debug!("auth notification stream closed");
                break;
            }
        }
    }
}
