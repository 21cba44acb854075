//! Unified error type for Fleetdesk clients.

use fleetdesk_model::UserId;
use fleetdesk_session::{SessionError, VerifyError};
use fleetdesk_store::StoreError;

/// The error taxonomy a sign-in screen or session guard deals with.
///
/// Sub-crate errors are mapped onto these variants by the `From` impls
/// below, so `?` inside the client turns a `SessionError` into the
/// user-facing reason directly.
#[derive(Debug, thiserror::Error)]
pub enum FleetdeskError {
    /// Email and password didn't match.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists but hasn't been activated (or was switched off
    /// before signing in).
    #[error("account is not active")]
    AccountInactive,

    /// The account was deactivated while signed in.
    #[error("account has been deactivated")]
    AccountDeactivated,

    #[error("session expired")]
    SessionExpired,

    /// Another device signed in as the same user.
    #[error("session was replaced by a sign-in on another device")]
    SessionReplaced,

    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The session store (or credential service) couldn't be reached.
    /// Nothing was decided; retrying later may succeed.
    #[error("session store temporarily unavailable: {0}")]
    TransientStoreError(#[source] StoreError),

    /// Reading or writing this device's session cache failed.
    #[error("local session cache failed: {0}")]
    LocalCache(#[source] StoreError),

    /// The configuration JSON didn't parse.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<SessionError> for FleetdeskError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UserNotFound(id) => Self::UserNotFound(id),
            SessionError::UserInactive(_) => Self::AccountInactive,
            SessionError::Stale(_) => Self::SessionReplaced,
            SessionError::Store(e) => Self::TransientStoreError(e),
        }
    }
}

impl From<VerifyError> for FleetdeskError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidCredentials => Self::InvalidCredentials,
            VerifyError::Unavailable(msg) => {
                Self::TransientStoreError(StoreError::Unavailable(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_session_error_inactive_maps_to_account_inactive() {
        let err: FleetdeskError = SessionError::UserInactive(UserId::random()).into();
        assert!(matches!(err, FleetdeskError::AccountInactive));
    }

    #[test]
    fn test_from_session_error_stale_maps_to_replaced() {
        let err: FleetdeskError = SessionError::Stale(UserId::random()).into();
        assert!(matches!(err, FleetdeskError::SessionReplaced));
    }

    #[test]
    fn test_from_session_error_store_maps_to_transient() {
        let err: FleetdeskError =
            SessionError::Store(StoreError::Unavailable("down".into())).into();
        assert!(matches!(err, FleetdeskError::TransientStoreError(_)));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_from_verify_error_invalid_maps_to_invalid_credentials() {
        let err: FleetdeskError = VerifyError::InvalidCredentials.into();
        assert!(matches!(err, FleetdeskError::InvalidCredentials));
    }

    #[test]
    fn test_from_verify_error_unavailable_maps_to_transient() {
        let err: FleetdeskError = VerifyError::Unavailable("idp down".into()).into();
        assert!(matches!(err, FleetdeskError::TransientStoreError(_)));
    }
}
