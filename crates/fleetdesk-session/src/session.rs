//! Session types: configuration, issued handles, and validation outcomes.
//!
//! A "session" here is the remote record's claim that exactly one device
//! owns a user's login. It tracks:
//! - WHO the session belongs to (`UserProfile`)
//! - WHICH device owns it (the `SessionToken`)
//! - WHEN it stops being honoured (`expires_at`)

use chrono::{DateTime, TimeDelta, Utc};
use fleetdesk_model::{SessionToken, UserProfile};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session issuance.
///
/// Deserializable with every field optional, so a host config file only
/// needs to mention what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long (in seconds) a freshly issued or extended session lasts.
    ///
    /// Default: 8 hours.
    pub session_duration_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 8 * 60 * 60,
        }
    }
}

impl SessionConfig {
    /// Longest session the authority will issue.
    pub const MAX_SESSION_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

    /// Clamp out-of-range values.
    ///
    /// - `session_duration_secs` raised to at least 1 second.
    /// - `session_duration_secs` capped at [`Self::MAX_SESSION_DURATION_SECS`].
    pub fn validated(mut self) -> Self {
        let clamped = self
            .session_duration_secs
            .clamp(1, Self::MAX_SESSION_DURATION_SECS);
        if clamped != self.session_duration_secs {
            tracing::warn!(
                requested = self.session_duration_secs,
                used = clamped,
                "session duration out of range, clamping"
            );
            self.session_duration_secs = clamped;
        }
        self
    }

    /// The session duration as a signed chrono delta.
    pub fn session_duration(&self) -> TimeDelta {
        let secs = self
            .session_duration_secs
            .min(Self::MAX_SESSION_DURATION_SECS);
        // Bounded by the cap above, far inside i64 seconds.
        TimeDelta::seconds(secs as i64)
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// What a successful `create_session` hands back: the owner's profile and
/// the freshly issued token with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub profile: UserProfile,
    pub token: SessionToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// The authority's verdict on a presented `(user id, token)` pair.
///
/// When several conditions hold at once, the first one listed wins:
///
/// ```text
///   UserNotFound > Replaced > Expired > Deactivated > Valid
/// ```
///
/// A replaced session is never reported as merely expired: "someone else
/// signed in" is the more useful thing to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The session is current. Carries the owner's profile.
    Valid(UserProfile),

    /// The session's expiry has passed (inclusive).
    Expired,

    /// Another sign-in overwrote the token, or it was cleared.
    Replaced,

    /// Token and expiry are fine but the account was deactivated.
    Deactivated,

    /// The user row is gone.
    UserNotFound,
}

impl Validation {
    /// `true` only for [`Validation::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}
