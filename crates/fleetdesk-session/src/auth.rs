//! Credential verification hook.
//!
//! Fleetdesk doesn't check passwords itself; that belongs to whatever
//! identity provider the deployment uses. It defines the
//! [`CredentialVerifier`] trait instead: one async method that takes an
//! email and password and returns the user's id or an error. Sign-in calls
//! it before asking the authority for a session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use fleetdesk_model::UserId;

use crate::VerifyError;

/// Checks an email/password pair and returns whose account it is.
///
/// # Example
///
/// ```rust
/// use fleetdesk_model::UserId;
/// use fleetdesk_session::{CredentialVerifier, VerifyError};
///
/// /// Accepts exactly one hard-coded account.
/// struct SingleUser(UserId);
///
/// impl CredentialVerifier for SingleUser {
///     async fn verify(&self, email: &str, password: &str) -> Result<UserId, VerifyError> {
///         if email == "ops@fleet.io" && password == "hunter2" {
///             Ok(self.0)
///         } else {
///             Err(VerifyError::InvalidCredentials)
///         }
///     }
/// }
/// ```
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies the credentials.
    ///
    /// # Returns
    /// - `Ok(UserId)` when the pair matches an account
    /// - `Err(VerifyError::InvalidCredentials)` when it doesn't
    /// - `Err(VerifyError::Unavailable)` when the provider can't be reached
    fn verify(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<UserId, VerifyError>> + Send;
}

/// An in-memory verifier for tests and demos.
///
/// Emails are matched case-insensitively after trimming whitespace.
/// Passwords are compared as given. Clones share the same accounts.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialVerifier {
    accounts: Arc<Mutex<HashMap<String, (String, UserId)>>>,
}

impl MemoryCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) an account.
    pub fn add_account(&self, email: &str, password: impl Into<String>, user_id: UserId) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(email), (password.into(), user_id));
    }

    /// Forgets an account. Returns whether one existed.
    pub fn remove_account(&self, email: &str) -> bool {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(email))
            .is_some()
    }
}

impl CredentialVerifier for MemoryCredentialVerifier {
    async fn verify(&self, email: &str, password: &str) -> Result<UserId, VerifyError> {
        let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        match accounts.get(&normalize(email)) {
            Some((expected, user_id)) if expected == password => Ok(*user_id),
            _ => Err(VerifyError::InvalidCredentials),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_matching_pair_returns_user_id() {
        let verifier = MemoryCredentialVerifier::new();
        let user = UserId::random();
        verifier.add_account("ana@fleet.io", "pw", user);

        assert_eq!(verifier.verify("ana@fleet.io", "pw").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_verify_email_case_and_whitespace_ignored() {
        let verifier = MemoryCredentialVerifier::new();
        let user = UserId::random();
        verifier.add_account("Ana@Fleet.io", "pw", user);

        assert_eq!(verifier.verify("  ana@FLEET.io ", "pw").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_verify_wrong_password_is_invalid_credentials() {
        let verifier = MemoryCredentialVerifier::new();
        verifier.add_account("ana@fleet.io", "pw", UserId::random());

        let result = verifier.verify("ana@fleet.io", "PW").await;

        assert!(matches!(result, Err(VerifyError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_removed_account_is_invalid_credentials() {
        let verifier = MemoryCredentialVerifier::new();
        verifier.add_account("ana@fleet.io", "pw", UserId::random());
        assert!(verifier.remove_account("ana@fleet.io"));

        let result = verifier.verify("ana@fleet.io", "pw").await;

        assert!(matches!(result, Err(VerifyError::InvalidCredentials)));
    }
}
