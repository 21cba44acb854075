//! The session authority: the one place that decides whether a session is
//! valid and the only code that mutates a user's session fields.
//!
//! It is responsible for:
//! - Creating sessions on sign-in (replacing whatever was there)
//! - Validating a presented token against the remote record
//! - Invalidating sessions on sign-out
//! - Extending a session's expiry, guarded by the token still being current
//!
//! # Single active session
//!
//! `create_session` overwrites `session_id` unconditionally. That write IS
//! the enforcement: the moment it lands, every other device's token stops
//! matching and their next `validate` reports [`Validation::Replaced`].
//! Nobody is told at that instant; other devices notice on their next
//! check.
//!
//! # Concurrency note
//!
//! The authority holds no mutable state of its own; all of it lives in the
//! record store, whose per-row atomicity is the only synchronization. Wrap
//! it in an `Arc` to share it with the session monitor's task.

use chrono::{DateTime, Utc};
use fleetdesk_model::{SessionToken, UserId};
use fleetdesk_store::{SessionFields, SessionRecordStore};

use crate::{
    Clock, SessionConfig, SessionError, SessionHandle, SystemClock, TokenIssuer,
    Validation,
};

/// Issues, validates, extends, and invalidates sessions.
///
/// ## Lifecycle of one token
///
/// ```text
/// create_session() ──→ validate() ... validate() ──→ invalidate()
///        │                   │                            │
///        ▼                   ▼                            ▼
///   [current] ──(another create_session)──→ [Replaced]  [cleared]
///        │
///        └──(expires_at ≤ now)──→ [Expired]    extend() pushes expires_at out
/// ```
pub struct SessionAuthority<S, C = SystemClock> {
    store: S,
    clock: C,
    issuer: TokenIssuer<C>,
    config: SessionConfig,
}

impl<S: SessionRecordStore> SessionAuthority<S, SystemClock> {
    /// Creates an authority over `store` using the system clock.
    pub fn with_system_clock(store: S, config: SessionConfig) -> Self {
        Self::new(store, config, SystemClock)
    }
}

impl<S, C> SessionAuthority<S, C>
where
    S: SessionRecordStore,
    C: Clock + Clone,
{
    /// Creates an authority over `store`, reading time from `clock`.
    pub fn new(store: S, config: SessionConfig, clock: C) -> Self {
        let config = config.validated();
        Self {
            issuer: TokenIssuer::new(config.clone(), clock.clone()),
            store,
            clock,
            config,
        }
    }

    /// Issues a new session for `user_id`, replacing any existing one.
    ///
    /// # Errors
    /// - [`SessionError::UserNotFound`]: no such user (or the row vanished
    ///   before the write landed)
    /// - [`SessionError::UserInactive`]: the account is not active
    /// - [`SessionError::Store`]: the store could not be reached
    pub async fn create_session(
        &self,
        user_id: UserId,
    ) -> Result<SessionHandle, SessionError> {
        let record = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or(SessionError::UserNotFound(user_id))?;

        if !record.is_active {
            tracing::info!(%user_id, "session refused: account inactive");
            return Err(SessionError::UserInactive(user_id));
        }

        let issued = self.issuer.issue(user_id);
        let replaced = record.session_id.is_some();

        let matched = self
            .store
            .write_session(
                user_id,
                Some(SessionFields {
                    session_id: issued.token.clone(),
                    expires_at: issued.expires_at,
                }),
            )
            .await?;
        if !matched {
            return Err(SessionError::UserNotFound(user_id));
        }

        tracing::info!(
            %user_id,
            expires_at = %issued.expires_at,
            replaced_previous = replaced,
            "session created"
        );

        Ok(SessionHandle {
            profile: record.profile(),
            token: issued.token,
            issued_at: issued.issued_at,
            expires_at: issued.expires_at,
        })
    }

    /// Decides whether `token` is `user_id`'s current, unexpired session
    /// on an active account.
    ///
    /// # Errors
    /// Only [`SessionError::Store`]; every verdict is an `Ok`.
    pub async fn validate(
        &self,
        user_id: UserId,
        token: &SessionToken,
    ) -> Result<Validation, SessionError> {
        let Some(record) = self.store.fetch_user(user_id).await? else {
            return Ok(Validation::UserNotFound);
        };

        if record.session_id.as_ref() != Some(token) {
            return Ok(Validation::Replaced);
        }

        if let Some(expires_at) = record.session_expires_at {
            if expires_at <= self.clock.now() {
                return Ok(Validation::Expired);
            }
        }

        if !record.is_active {
            return Ok(Validation::Deactivated);
        }

        Ok(Validation::Valid(record.profile()))
    }

    /// Clears `user_id`'s session fields.
    ///
    /// Idempotent: clearing an absent session, or a user that no longer
    /// exists, succeeds.
    pub async fn invalidate(&self, user_id: UserId) -> Result<(), SessionError> {
        let matched = self.store.write_session(user_id, None).await?;
        if matched {
            tracing::info!(%user_id, "session invalidated");
        } else {
            tracing::debug!(%user_id, "invalidate: no user row, nothing to clear");
        }
        Ok(())
    }

    /// Pushes the session's expiry to `now + duration`, but only if `token`
    /// is still the user's current session.
    ///
    /// # Errors
    /// - [`SessionError::Stale`]: another sign-in (or a sign-out) replaced
    ///   the token; nothing was written
    /// - [`SessionError::Store`]: the store could not be reached
    pub async fn extend(
        &self,
        user_id: UserId,
        token: &SessionToken,
    ) -> Result<DateTime<Utc>, SessionError> {
        let expires_at = self.clock.now() + self.config.session_duration();

        let matched = self
            .store
            .extend_if_current(user_id, token, expires_at)
            .await?;
        if !matched {
            tracing::info!(%user_id, "extend refused: session superseded");
            return Err(SessionError::Stale(user_id));
        }

        tracing::debug!(%user_id, %expires_at, "session extended");
        Ok(expires_at)
    }

    /// The clock this authority judges expiry by.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The (validated) configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

// =========================================================================
// Tests
// =========================================================================
