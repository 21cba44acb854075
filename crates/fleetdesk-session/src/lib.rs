//! Session lifecycle for Fleetdesk.
//!
//! This crate owns the rules about who is signed in:
//!
//! 1. **Credentials**: checking an email/password ([`CredentialVerifier`] trait)
//! 2. **Issuance**: minting unguessable tokens ([`TokenIssuer`])
//! 3. **Authority**: creating, validating, extending, and invalidating the
//!    single active session per user ([`SessionAuthority`])
//! 4. **Device state**: the local copy of the session ([`LocalSessionCache`])
//!    and the events a UI listens for ([`EventNotifier`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client layer (above)  ← sign-in/out, periodic monitoring
//!     ↕
//! Session layer (this crate)  ← decides validity, enforces one session per user
//!     ↕
//! Store layer (below)  ← user records, device-local key/value storage
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod authority;
pub mod cache;
mod clock;
mod error;
mod events;
mod session;
mod token;

pub use auth::{CredentialVerifier, MemoryCredentialVerifier};
pub use authority::SessionAuthority;
pub use cache::{LocalSessionCache, SessionSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, VerifyError};
pub use events::EventNotifier;
pub use session::{SessionConfig, SessionHandle, Validation};
pub use token::{IssuedToken, TokenIssuer};
