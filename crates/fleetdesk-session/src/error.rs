//! Error types for the session layer.

use fleetdesk_model::UserId;
use fleetdesk_store::StoreError;

/// Errors from session-mutating operations on the
/// [`SessionAuthority`](crate::SessionAuthority).
///
/// Validation outcomes (expired, replaced, ...) are NOT errors; they come
/// back as a [`Validation`](crate::Validation). An `Err` means the
/// operation itself could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No user row exists for this id.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The account exists but is not active (pending approval or
    /// switched off), so no session may be issued for it.
    #[error("user {0} is not active")]
    UserInactive(UserId),

    /// The presented token is no longer the user's current session, so
    /// the guarded update matched nothing.
    #[error("session for user {0} has been superseded")]
    Stale(UserId),

    /// The record store could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors a [`CredentialVerifier`](crate::CredentialVerifier) reports.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Email and password don't match any account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The credential service could not be reached.
    #[error("credential service unavailable: {0}")]
    Unavailable(String),
}
