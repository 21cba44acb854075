//! In-process session record store.
//!
//! Stands in for the remote user table in tests and the demo. Clones share
//! the same rows, so two simulated devices holding clones see each other's
//! writes exactly the way two browsers see one database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetdesk_model::{SessionToken, UserId};

use crate::{SessionFields, SessionRecordStore, StoreError, UserRecord};

/// A [`SessionRecordStore`] backed by a `HashMap` behind a mutex.
///
/// Each call holds the lock for the whole read or update, which gives the
/// same per-row atomicity the remote table provides. Two knobs simulate
/// the network: [`set_available`](Self::set_available) makes every call
/// fail with [`StoreError::Unavailable`], and
/// [`set_latency`](Self::set_latency) delays every call by a fixed amount
/// of (Tokio) time.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<HashMap<UserId, UserRecord>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a user row.
    pub fn insert_user(&self, record: UserRecord) {
        self.rows().insert(record.id, record);
    }

    /// Deletes a user row. Returns `true` if it existed.
    pub fn remove_user(&self, user_id: UserId) -> bool {
        self.rows().remove(&user_id).is_some()
    }

    /// Returns a copy of a user row, bypassing the simulated network.
    pub fn user(&self, user_id: UserId) -> Option<UserRecord> {
        self.rows().get(&user_id).cloned()
    }

    /// Flips a user's `is_active` flag. Returns `false` if the row is missing.
    pub fn set_active(&self, user_id: UserId, active: bool) -> bool {
        match self.rows().get_mut(&user_id) {
            Some(row) => {
                row.is_active = active;
                true
            }
            None => false,
        }
    }

    /// When `false`, every store call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delays every store call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// How many `fetch_user` calls have been made (successful or not).
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<UserId, UserRecord>> {
        // A panic while holding the lock can't leave a row half-written:
        // every mutation below is a single assignment.
        self.inner.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies the simulated latency, then fails if the store is "down".
    async fn round_trip(&self) -> Result<(), StoreError> {
        let ms = self.inner.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is switched off".into(),
            ));
        }
        Ok(())
    }
}

impl SessionRecordStore for MemoryRecordStore {
    async fn fetch_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self.rows().get(&user_id).cloned())
    }

    async fn write_session(
        &self,
        user_id: UserId,
        fields: Option<SessionFields>,
    ) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let mut rows = self.rows();
        let Some(row) = rows.get_mut(&user_id) else {
            return Ok(false);
        };
        match fields {
            Some(SessionFields {
                session_id,
                expires_at,
            }) => {
                row.session_id = Some(session_id);
                row.session_expires_at = Some(expires_at);
            }
            None => {
                row.session_id = None;
                row.session_expires_at = None;
            }
        }
        tracing::trace!(%user_id, "session columns written");
        Ok(true)
    }

    async fn extend_if_current(
        &self,
        user_id: UserId,
        current: &SessionToken,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let mut rows = self.rows();
        match rows.get_mut(&user_id) {
            Some(row) if row.session_id.as_ref() == Some(current) => {
                row.session_expires_at = Some(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetdesk_model::Role;

    use super::*;

    fn seeded() -> (MemoryRecordStore, UserId) {
        let store = MemoryRecordStore::new();
        let id = UserId::random();
        store.insert_user(UserRecord::new(id, "d@fleet.io", "Dee", Role::Dispatcher));
        (store, id)
    }

    fn fields(token: &str) -> SessionFields {
        SessionFields {
            session_id: SessionToken::new(token),
            expires_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_fetch_user_missing_returns_none() {
        let store = MemoryRecordStore::new();

        let row = store.fetch_user(UserId::random()).await.unwrap();

        assert!(row.is_none());
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_write_session_overwrites_previous_token() {
        let (store, id) = seeded();
        store.write_session(id, Some(fields("one"))).await.unwrap();

        let matched = store.write_session(id, Some(fields("two"))).await.unwrap();

        assert!(matched);
        assert_eq!(
            store.user(id).unwrap().session_id,
            Some(SessionToken::new("two"))
        );
    }

    #[tokio::test]
    async fn test_write_session_none_clears_both_columns() {
        let (store, id) = seeded();
        store.write_session(id, Some(fields("one"))).await.unwrap();

        store.write_session(id, None).await.unwrap();

        let row = store.user(id).unwrap();
        assert!(row.session_id.is_none());
        assert!(row.session_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_write_session_unknown_user_returns_false() {
        let store = MemoryRecordStore::new();

        let matched = store
            .write_session(UserId::random(), Some(fields("x")))
            .await
            .unwrap();

        assert!(!matched);
    }

    #[tokio::test]
    async fn test_extend_if_current_mismatched_token_leaves_expiry() {
        let (store, id) = seeded();
        store.write_session(id, Some(fields("current"))).await.unwrap();
        let before = store.user(id).unwrap().session_expires_at;

        let later = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let matched = store
            .extend_if_current(id, &SessionToken::new("stale"), later)
            .await
            .unwrap();

        assert!(!matched);
        assert_eq!(store.user(id).unwrap().session_expires_at, before);
    }

    #[tokio::test]
    async fn test_extend_if_current_matching_token_updates_expiry() {
        let (store, id) = seeded();
        store.write_session(id, Some(fields("current"))).await.unwrap();

        let later = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let matched = store
            .extend_if_current(id, &SessionToken::new("current"), later)
            .await
            .unwrap();

        assert!(matched);
        assert_eq!(store.user(id).unwrap().session_expires_at, Some(later));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let (store, id) = seeded();
        store.set_available(false);

        assert!(matches!(
            store.fetch_user(id).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.write_session(id, None).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_available(true);
        assert!(store.fetch_user(id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_round_trip() {
        let (store, id) = seeded();
        store.set_latency(Duration::from_secs(3));
        let start = tokio::time::Instant::now();

        store.fetch_user(id).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_clones_share_rows() {
        let (store, id) = seeded();
        let other = store.clone();

        other.set_active(id, false);

        assert!(!store.user(id).unwrap().is_active);
    }
}
