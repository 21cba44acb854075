//! `SessionClient` builder and the sign-in / sign-out / session-guard
//! operations a device performs.
//!
//! This is the entry point for an application embedding Fleetdesk. It ties
//! the layers together: credentials → authority → local cache → monitor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetdesk_model::{SessionEvent, SessionToken, UserProfile};
use fleetdesk_session::{
    Clock, CredentialVerifier, EventNotifier, LocalSessionCache, SessionAuthority,
    SessionSnapshot, SystemClock, Validation,
};
use fleetdesk_store::{LocalStore, MemoryLocalStore, SessionRecordStore};
use tokio::sync::broadcast;

use crate::{FleetdeskConfig, FleetdeskError, SessionMonitor};

/// How a sign-out went.
///
/// Local state is always cleared; the variants only say what happened to
/// the remote session.
#[derive(Debug)]
pub enum SignOutOutcome {
    /// The remote session was cleared.
    Complete,
    /// This device wasn't signed in.
    NoSession,
    /// Clearing the remote session failed. The remote token stays until it
    /// expires or another sign-in replaces it.
    RemoteClearFailed(FleetdeskError),
}

/// Builder for a [`SessionClient`].
///
/// # Example
///
/// ```rust,ignore
/// let client = SessionClient::builder(store, verifier)
///     .config(FleetdeskConfig::from_json(&json)?)
///     .local_store(FileLocalStore::open("session.json"))
///     .build();
/// let profile = client.sign_in("ana@fleet.io", "secret").await?;
/// ```
pub struct SessionClientBuilder<S, V, C = SystemClock> {
    store: S,
    verifier: V,
    clock: C,
    config: FleetdeskConfig,
    local_store: Option<Box<dyn LocalStore>>,
    notifier: Option<EventNotifier>,
}

impl<S, V, C> SessionClientBuilder<S, V, C>
where
    S: SessionRecordStore,
    V: CredentialVerifier,
    C: Clock + Clone,
{
    /// Sets the configuration.
    pub fn config(mut self, config: FleetdeskConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where this device keeps its session keys.
    ///
    /// Defaults to an in-memory store that forgets everything on drop.
    pub fn local_store(mut self, store: impl LocalStore) -> Self {
        self.local_store = Some(Box::new(store));
        self
    }

    /// Shares an existing notifier instead of creating a fresh one.
    pub fn notifier(mut self, notifier: EventNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Swaps the wall clock used for expiry decisions.
    pub fn clock<C2: Clock + Clone>(self, clock: C2) -> SessionClientBuilder<S, V, C2> {
        SessionClientBuilder {
            store: self.store,
            verifier: self.verifier,
            clock,
            config: self.config,
            local_store: self.local_store,
            notifier: self.notifier,
        }
    }

    pub fn build(self) -> SessionClient<S, V, C> {
        let config = self.config.validated();
        let authority = Arc::new(SessionAuthority::new(
            self.store,
            config.session.clone(),
            self.clock,
        ));
        let cache = Arc::new(match self.local_store {
            Some(store) => LocalSessionCache::from_boxed(store),
            None => LocalSessionCache::new(MemoryLocalStore::new()),
        });
        let notifier = self.notifier.unwrap_or_default();
        let monitor = SessionMonitor::new(
            Arc::clone(&authority),
            Arc::clone(&cache),
            notifier.clone(),
            config.monitor.clone(),
        );

        SessionClient {
            authority,
            verifier: self.verifier,
            cache,
            notifier,
            monitor,
        }
    }
}

/// One device's view of its session.
///
/// Owns the local cache and the background monitor. Any number of
/// clients may share a record store; each one is a separate device.
pub struct SessionClient<S, V, C = SystemClock> {
    authority: Arc<SessionAuthority<S, C>>,
    verifier: V,
    cache: Arc<LocalSessionCache>,
    notifier: EventNotifier,
    monitor: SessionMonitor<S, C>,
}

impl<S, V> SessionClient<S, V, SystemClock>
where
    S: SessionRecordStore,
    V: CredentialVerifier,
{
    /// Creates a builder with default config, the system clock, and an
    /// in-memory local store.
    pub fn builder(store: S, verifier: V) -> SessionClientBuilder<S, V, SystemClock> {
        SessionClientBuilder {
            store,
            verifier,
            clock: SystemClock,
            config: FleetdeskConfig::default(),
            local_store: None,
            notifier: None,
        }
    }
}

impl<S, V, C> SessionClient<S, V, C>
where
    S: SessionRecordStore,
    V: CredentialVerifier,
    C: Clock + Clone,
{
    /// Signs in, replacing any session the user holds on another device.
    ///
    /// On success the session is cached locally and monitoring starts.
    /// On failure nothing is left behind: if the local write fails, the
    /// remote session just created is cleared again (best effort).
    ///
    /// # Errors
    /// - [`FleetdeskError::InvalidCredentials`]
    /// - [`FleetdeskError::AccountInactive`]
    /// - [`FleetdeskError::UserNotFound`]
    /// - [`FleetdeskError::TransientStoreError`]
    /// - [`FleetdeskError::LocalCache`]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, FleetdeskError> {
        // A check still running for the previous session would read our new
        // token as a takeover.
        self.monitor.stop();

        let user_id = self.verifier.verify(email, password).await.map_err(|e| {
            tracing::info!(error = %e, "sign-in rejected");
            FleetdeskError::from(e)
        })?;

        let handle = self.authority.create_session(user_id).await?;

        if let Err(e) = self.cache.save(&SessionSnapshot::from_handle(&handle)) {
            tracing::warn!(%user_id, error = %e, "could not cache session, rolling back sign-in");
            if let Err(rollback) = self.authority.invalidate(user_id).await {
                tracing::warn!(%user_id, error = %rollback, "rollback of remote session failed");
            }
            if let Err(clear) = self.cache.clear() {
                tracing::warn!(error = %clear, "could not clear partial local session");
            }
            return Err(FleetdeskError::LocalCache(e));
        }

        self.monitor.start();
        tracing::info!(%user_id, role = %handle.profile.role, "signed in");
        Ok(handle.profile)
    }

    /// Signs out: clears the remote session if there is one, stops
    /// monitoring, and clears local state.
    ///
    /// Local state is cleared even when the remote call fails.
    pub async fn sign_out(&self) -> SignOutOutcome {
        let snapshot = self.cache.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read local session during sign-out");
            None
        });

        // Stop first so an in-flight check can't report our own sign-out
        // as a takeover.
        self.monitor.stop();

        let outcome = match snapshot {
            None => SignOutOutcome::NoSession,
            Some(snapshot) => match self.authority.invalidate(snapshot.user_id).await {
                Ok(()) => {
                    tracing::info!(user_id = %snapshot.user_id, "signed out");
                    SignOutOutcome::Complete
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %snapshot.user_id,
                        error = %e,
                        "remote session clear failed, signing out locally"
                    );
                    SignOutOutcome::RemoteClearFailed(e.into())
                }
            },
        };

        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "could not clear local session");
        }
        outcome
    }

    /// Checks the cached session against the authority.
    ///
    /// - `Ok(None)`: this device isn't signed in.
    /// - `Ok(Some(profile))`: signed in and valid; monitoring is running.
    /// - `Err(SessionExpired | SessionReplaced | AccountDeactivated |
    ///   UserNotFound)`: the session is over. Local state was cleared,
    ///   monitoring stopped, and the matching event emitted.
    /// - `Err(TransientStoreError)`: couldn't tell. Local state is kept.
    pub async fn get_session(&self) -> Result<Option<UserProfile>, FleetdeskError> {
        let Some(snapshot) = self.cache.load().map_err(FleetdeskError::LocalCache)? else {
            return Ok(None);
        };
        let user_id = snapshot.user_id;

        if snapshot.is_expired_at(self.authority.clock().now()) {
            self.end_session(&snapshot.token, SessionEvent::Expired { user_id });
            return Err(FleetdeskError::SessionExpired);
        }

        match self.authority.validate(user_id, &snapshot.token).await? {
            Validation::Valid(profile) => {
                if !self.monitor.is_running() {
                    self.monitor.start();
                }
                Ok(Some(profile))
            }
            Validation::Replaced => {
                self.end_session(&snapshot.token, SessionEvent::Replaced { user_id });
                Err(FleetdeskError::SessionReplaced)
            }
            Validation::UserNotFound => {
                self.end_session(&snapshot.token, SessionEvent::Replaced { user_id });
                Err(FleetdeskError::UserNotFound(user_id))
            }
            Validation::Expired => {
                self.end_session(&snapshot.token, SessionEvent::Expired { user_id });
                Err(FleetdeskError::SessionExpired)
            }
            Validation::Deactivated => {
                self.end_session(&snapshot.token, SessionEvent::Expired { user_id });
                Err(FleetdeskError::AccountDeactivated)
            }
        }
    }

    /// Pushes the session's expiry out by one full session duration.
    ///
    /// Returns the new expiry, or `None` if the session could not be
    /// renewed (not signed in, superseded, or the store is unreachable).
    pub async fn extend_session(&self) -> Option<DateTime<Utc>> {
        let snapshot = match self.cache.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read local session for extend");
                return None;
            }
        };

        match self.authority.extend(snapshot.user_id, &snapshot.token).await {
            Ok(expires_at) => {
                if let Err(e) = self.cache.update_expiry(expires_at) {
                    tracing::warn!(error = %e, "session extended remotely but local expiry not updated");
                }
                Some(expires_at)
            }
            Err(e) => {
                tracing::info!(user_id = %snapshot.user_id, error = %e, "session not renewed");
                None
            }
        }
    }

    /// The locally cached session, without asking the authority.
    ///
    /// A hint for rendering "who is signed in" quickly; never proof of
    /// validity.
    pub fn cached_session(&self) -> Option<SessionSnapshot> {
        self.cache.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read local session");
            None
        })
    }

    /// Receives `session-expired` / `session-replaced` events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    pub fn monitor(&self) -> &SessionMonitor<S, C> {
        &self.monitor
    }

    pub fn authority(&self) -> &SessionAuthority<S, C> {
        &self.authority
    }

    /// Stops monitoring and clears `token` from the cache. The event goes
    /// out only if this call is the one that cleared it; a monitor check
    /// that got there first has already reported it.
    fn end_session(&self, token: &SessionToken, event: SessionEvent) {
        self.monitor.stop();
        match self.cache.clear_if_token(token) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(event = event.name(), "session end already reported");
                return;
            }
            Err(e) => tracing::warn!(error = %e, "could not clear local session"),
        }
        tracing::info!(user_id = %event.user_id(), event = event.name(), "session ended");
        self.notifier.notify(event);
    }
}
