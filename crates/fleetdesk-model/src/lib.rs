//! Shared model types for Fleetdesk.
//!
//! This crate defines the values every other layer speaks in:
//!
//! - **Identity** ([`UserId`], [`Role`], [`UserProfile`]): who is signed in.
//! - **Sessions** ([`SessionToken`]): the opaque handle for one login.
//! - **Events** ([`SessionEvent`]): forced-logout notifications for the UI.
//! - **Errors** ([`ModelError`]): what can go wrong parsing stored values.
//!
//! # Architecture
//!
//! ```text
//! Store (rows, key-value pairs) → Model (typed values) → Session (decisions)
//! ```

mod error;
mod types;

pub use error::ModelError;
pub use types::{Role, SessionEvent, SessionToken, UserId, UserProfile};
