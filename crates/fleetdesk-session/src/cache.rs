//! The device-local copy of the current session.
//!
//! Five string keys in a [`LocalStore`]. They are an optimization for
//! "who is signed in here" and are never trusted for validity; the remote
//! record is authoritative.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use fleetdesk_model::{Role, SessionToken, UserId};
use fleetdesk_store::{LocalStore, StoreError};

use crate::SessionHandle;

pub const TOKEN_KEY: &str = "fleetdesk.session.token";
pub const USER_ID_KEY: &str = "fleetdesk.session.user_id";
pub const EMAIL_KEY: &str = "fleetdesk.session.email";
pub const ROLE_KEY: &str = "fleetdesk.session.role";
pub const EXPIRES_AT_KEY: &str = "fleetdesk.session.expires_at";

const ALL_KEYS: [&str; 5] = [TOKEN_KEY, USER_ID_KEY, EMAIL_KEY, ROLE_KEY, EXPIRES_AT_KEY];

/// What this device believes its session is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: SessionToken,
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn from_handle(handle: &SessionHandle) -> Self {
        Self {
            token: handle.token.clone(),
            user_id: handle.profile.id,
            email: handle.profile.email.clone(),
            role: handle.profile.role,
            expires_at: handle.expires_at,
        }
    }

    /// Whether the cached expiry has passed at `now` (inclusive).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Reads and writes the session keys in a [`LocalStore`].
///
/// The keys are all-or-nothing: a partial or unparsable set reads as "no
/// session" and is wiped on the way out.
pub struct LocalSessionCache {
    store: Box<dyn LocalStore>,
    /// Serializes `clear_if_token` so only one caller wins a given token.
    claim: Mutex<()>,
}

impl LocalSessionCache {
    pub fn new(store: impl LocalStore) -> Self {
        Self::from_boxed(Box::new(store))
    }

    pub fn from_boxed(store: Box<dyn LocalStore>) -> Self {
        Self {
            store,
            claim: Mutex::new(()),
        }
    }

    /// Loads the cached session, if a complete one is present.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let mut values = Vec::with_capacity(ALL_KEYS.len());
        for key in ALL_KEYS {
            values.push(self.store.get(key)?);
        }

        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        match parse(&values) {
            Some(snapshot) => Ok(Some(snapshot)),
            None => {
                tracing::warn!("local session keys incomplete or unreadable, clearing");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Writes all five keys for `snapshot`.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, snapshot.token.as_str())?;
        self.store.set(USER_ID_KEY, &snapshot.user_id.to_string())?;
        self.store.set(EMAIL_KEY, &snapshot.email)?;
        self.store.set(ROLE_KEY, snapshot.role.as_str())?;
        self.store.set(EXPIRES_AT_KEY, &snapshot.expires_at.to_rfc3339())?;
        tracing::debug!(user_id = %snapshot.user_id, "local session saved");
        Ok(())
    }

    /// Rewrites only the expiry key.
    pub fn update_expiry(&self, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store.set(EXPIRES_AT_KEY, &expires_at.to_rfc3339())
    }

    /// Removes every session key. Removing absent keys is fine.
    pub fn clear(&self) -> Result<(), StoreError> {
        for key in ALL_KEYS {
            self.store.remove(key)?;
        }
        tracing::debug!("local session cleared");
        Ok(())
    }

    /// Clears the keys only if they still hold `token`.
    ///
    /// Returns `true` if this call cleared them, `false` if the cache was
    /// already empty or now holds a different session.
    pub fn clear_if_token(&self, token: &SessionToken) -> Result<bool, StoreError> {
        let _claim = self.claim.lock().unwrap_or_else(PoisonError::into_inner);
        match self.store.get(TOKEN_KEY)? {
            Some(current) if current == token.as_str() => {
                self.clear()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn parse(values: &[Option<String>]) -> Option<SessionSnapshot> {
    let [token, user_id, email, role, expires_at] = values else {
        return None;
    };
    Some(SessionSnapshot {
        token: SessionToken::new(token.as_deref()?),
        user_id: user_id.as_deref()?.parse().ok()?,
        email: email.clone()?,
        role: role.as_deref()?.parse().ok()?,
        expires_at: DateTime::parse_from_rfc3339(expires_at.as_deref()?)
            .ok()?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use fleetdesk_store::{FileLocalStore, MemoryLocalStore};

    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            token: SessionToken::new("abc123"),
            user_id: UserId::random(),
            email: "ana@fleet.io".into(),
            role: Role::Dispatcher,
            expires_at: DateTime::from_timestamp(1_700_028_800, 0).unwrap(),
        }
    }

    #[test]
    fn test_load_empty_store_returns_none() {
        let cache = LocalSessionCache::new(MemoryLocalStore::new());

        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load_returns_same_snapshot() {
        let cache = LocalSessionCache::new(MemoryLocalStore::new());
        let snap = snapshot();

        cache.save(&snap).unwrap();

        assert_eq!(cache.load().unwrap(), Some(snap));
    }

    #[test]
    fn test_load_partial_keys_clears_and_returns_none() {
        let store = MemoryLocalStore::new();
        let cache = LocalSessionCache::new(store.clone());
        cache.save(&snapshot()).unwrap();
        store.remove(EMAIL_KEY).unwrap();

        assert_eq!(cache.load().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_garbage_expiry_clears_and_returns_none() {
        let store = MemoryLocalStore::new();
        let cache = LocalSessionCache::new(store.clone());
        cache.save(&snapshot()).unwrap();
        store.set(EXPIRES_AT_KEY, "next tuesday").unwrap();

        assert_eq!(cache.load().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_expiry_changes_only_expiry() {
        let cache = LocalSessionCache::new(MemoryLocalStore::new());
        let snap = snapshot();
        cache.save(&snap).unwrap();
        let later = snap.expires_at + TimeDelta::hours(2);

        cache.update_expiry(later).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.expires_at, later);
        assert_eq!(loaded.token, snap.token);
    }

    #[test]
    fn test_clear_if_token_matching_clears_once() {
        let store = MemoryLocalStore::new();
        let cache = LocalSessionCache::new(store.clone());
        let snap = snapshot();
        cache.save(&snap).unwrap();

        assert!(cache.clear_if_token(&snap.token).unwrap());
        assert!(store.is_empty());
        assert!(!cache.clear_if_token(&snap.token).unwrap());
    }

    #[test]
    fn test_clear_if_token_other_session_keeps_keys() {
        let cache = LocalSessionCache::new(MemoryLocalStore::new());
        let snap = snapshot();
        cache.save(&snap).unwrap();

        assert!(!cache.clear_if_token(&SessionToken::new("older")).unwrap());
        assert_eq!(cache.load().unwrap(), Some(snap));
    }

    #[test]
    fn test_clear_twice_is_ok() {
        let store = MemoryLocalStore::new();
        let cache = LocalSessionCache::new(store.clone());
        cache.save(&snapshot()).unwrap();

        cache.clear().unwrap();
        cache.clear().unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn test_is_expired_at_boundary_is_inclusive() {
        let snap = snapshot();

        assert!(!snap.is_expired_at(snap.expires_at - TimeDelta::seconds(1)));
        assert!(snap.is_expired_at(snap.expires_at));
    }

    #[test]
    fn test_file_backed_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let snap = snapshot();

        LocalSessionCache::new(FileLocalStore::open(&path))
            .save(&snap)
            .unwrap();
        let reopened = LocalSessionCache::new(FileLocalStore::open(&path));

        assert_eq!(reopened.load().unwrap(), Some(snap));
    }
}
