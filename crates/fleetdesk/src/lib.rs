//! # Fleetdesk
//!
//! Single-active-session sign-in for the Fleetdesk operations console.
//!
//! A user may be signed in on one device at a time. Signing in anywhere
//! silently replaces the previous session; the replaced device finds out
//! within one monitoring interval and gets a `session-replaced` event.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetdesk::prelude::*;
//!
//! # async fn run() -> Result<(), FleetdeskError> {
//! let store = MemoryRecordStore::new();
//! let verifier = MemoryCredentialVerifier::new();
//! let client = SessionClient::builder(store, verifier).build();
//!
//! let mut events = client.subscribe();
//! let profile = client.sign_in("ana@fleet.io", "secret").await?;
//! // ... later, on another device, the same user signs in ...
//! if let Ok(event) = events.recv().await {
//!     println!("{} ended: {event}", profile.full_name);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod monitor;

pub use client::{SessionClient, SessionClientBuilder, SignOutOutcome};
pub use config::{FleetdeskConfig, MonitorConfig};
pub use error::FleetdeskError;
pub use monitor::{MonitorState, SessionMonitor};

/// Everything an application typically needs.
pub mod prelude {
    pub use crate::{
        FleetdeskConfig, FleetdeskError, MonitorConfig, MonitorState, SessionClient,
        SignOutOutcome,
    };
    pub use fleetdesk_model::{Role, SessionEvent, SessionToken, UserId, UserProfile};
    pub use fleetdesk_session::{
        Clock, CredentialVerifier, EventNotifier, ManualClock, MemoryCredentialVerifier,
        SessionConfig, SessionSnapshot, SystemClock,
    };
    pub use fleetdesk_store::{
        FileLocalStore, LocalStore, MemoryLocalStore, MemoryRecordStore, SessionRecordStore,
        UserRecord,
    };
}
