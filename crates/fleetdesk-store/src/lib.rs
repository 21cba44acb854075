//! Store abstractions for Fleetdesk sessions.
//!
//! Two very different stores take part in every session decision:
//!
//! - the **session record store**: the remote user table holding the
//!   authoritative `session_id` / `session_expires_at` / `is_active`
//!   fields ([`SessionRecordStore`]);
//! - the **local store**: the client-side key-value storage that survives
//!   page reloads and caches what the client *believes* ([`LocalStore`]).
//!
//! Both are traits so the session layer never depends on a concrete
//! backend. In-process implementations ship here: [`MemoryRecordStore`],
//! [`MemoryLocalStore`], and the file-backed [`FileLocalStore`].

mod error;
mod local;
mod memory;

pub use error::StoreError;
pub use local::{FileLocalStore, LocalStore, MemoryLocalStore};
pub use memory::MemoryRecordStore;

use chrono::{DateTime, Utc};
use fleetdesk_model::{Role, SessionToken, UserId, UserProfile};

/// One row of the remote user table, restricted to the columns the
/// session layer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    /// Accounts start inactive until an administrator approves them, and
    /// can be switched off again later.
    pub is_active: bool,
    /// The token of the device that currently owns this user's session.
    pub session_id: Option<SessionToken>,
    pub session_expires_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Creates an active user with no session.
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: full_name.into(),
            role,
            is_active: true,
            session_id: None,
            session_expires_at: None,
        }
    }

    /// The profile handed back to the UI.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
        }
    }
}

/// The pair of session columns written together on sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFields {
    pub session_id: SessionToken,
    pub expires_at: DateTime<Utc>,
}

/// The remote table that owns each user's session fields.
///
/// The three operations are the only ones the session layer needs from
/// the backend: read one row, overwrite the session columns, and update
/// the expiry guarded by an equality filter on `session_id`.
///
/// Methods return `impl Future + Send` (rather than `async fn`) because
/// the session monitor calls them from a spawned Tokio task.
pub trait SessionRecordStore: Send + Sync + 'static {
    /// Reads the user row. `Ok(None)` means the row does not exist.
    fn fetch_user(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    /// Unconditionally overwrites both session columns. `None` clears them.
    ///
    /// Returns `Ok(false)` if no row matched `user_id`.
    fn write_session(
        &self,
        user_id: UserId,
        fields: Option<SessionFields>,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Sets `session_expires_at` only where `session_id` still equals
    /// `current`.
    ///
    /// Returns `Ok(false)` if no row matched both filters.
    fn extend_if_current(
        &self,
        user_id: UserId,
        current: &SessionToken,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_new_is_active_without_session() {
        let record =
            UserRecord::new(UserId::random(), "a@fleet.io", "Ana", Role::Driver);
        assert!(record.is_active);
        assert!(record.session_id.is_none());
        assert!(record.session_expires_at.is_none());
    }

    #[test]
    fn test_user_record_profile_copies_identity_columns() {
        let id = UserId::random();
        let record = UserRecord::new(id, "a@fleet.io", "Ana", Role::Manager);

        let profile = record.profile();

        assert_eq!(profile.id, id);
        assert_eq!(profile.email, "a@fleet.io");
        assert_eq!(profile.full_name, "Ana");
        assert_eq!(profile.role, Role::Manager);
    }
}
