//! Core types shared by every Fleetdesk session layer.
//!
//! These are the values that cross layer boundaries: they are read from
//! the remote user table, written into the client-side cache, and handed
//! to the UI. None of them know HOW they are stored: that's the job of
//! `fleetdesk-store`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ModelError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for a dashboard user.
///
/// A newtype over `Uuid` so a user id can never be confused with any
/// other uuid-shaped value (vehicle ids, trip ids, ...) that the rest of
/// the dashboard passes around.
///
/// `#[serde(transparent)]` serializes it as the bare uuid string, which
/// is what the remote user table stores in its primary key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generates a fresh random user id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the raw 128-bit value.
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ModelError::InvalidUserId(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The dashboard role a user signs in with.
///
/// The session layer only carries the role around (it is cached locally
/// so pages can render without a round trip); deciding what a role may
/// do lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Dispatcher,
    Driver,
    Viewer,
}

impl Role {
    /// The stable lowercase name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Dispatcher => "dispatcher",
            Self::Driver => "driver",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "dispatcher" => Ok(Self::Dispatcher),
            "driver" => Ok(Self::Driver),
            "viewer" => Ok(Self::Viewer),
            other => Err(ModelError::UnknownRole(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

/// The slice of a user that sign-in and session checks hand back to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// An opaque handle identifying one issued login.
///
/// The token has no structure anyone is allowed to rely on: the only
/// meaningful operation is equality. It is stored remotely as the user's
/// `session_id` and mirrored into the client cache.
///
/// `Debug` is hand-written so tokens never end up in log output when a
/// struct holding one is printed with `{:?}`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps token text that was previously issued or read from storage.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text, for writing back to storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// A forced-logout notification the UI observes.
///
/// `#[serde(tag = "event")]` plus the per-variant renames yield
/// `{ "event": "session-replaced", "user_id": "..." }`, the same names
/// the dashboard listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The session ran out (or the account was deactivated).
    #[serde(rename = "session-expired")]
    Expired { user_id: UserId },

    /// Another device signed in and took the session over.
    #[serde(rename = "session-replaced")]
    Replaced { user_id: UserId },
}

impl SessionEvent {
    /// The event name the UI listens for.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Expired { .. } => "session-expired",
            Self::Replaced { .. } => "session-replaced",
        }
    }

    /// The user whose session ended.
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Expired { user_id } | Self::Replaced { user_id } => *user_id,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.user_id())
    }
}

// =========================================================================
// Tests
// =========================================================================
