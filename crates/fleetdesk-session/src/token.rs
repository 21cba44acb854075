//! Session token issuance.

use chrono::{DateTime, Utc};
use fleetdesk_model::{SessionToken, UserId};
use rand::Rng;

use crate::{Clock, SessionConfig};

/// A token together with the instant it was issued and when it lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: SessionToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Produces new session tokens.
///
/// Pure computation: nothing is persisted here. The token text is the
/// user id, the issue time in nanoseconds, and 128 random bits, all as
/// lowercase hex. Uniqueness rests on the random part; the other two only
/// make accidental collisions across users or instants impossible rather
/// than merely improbable.
#[derive(Debug, Clone)]
pub struct TokenIssuer<C> {
    clock: C,
    config: SessionConfig,
}

impl<C: Clock> TokenIssuer<C> {
    pub fn new(config: SessionConfig, clock: C) -> Self {
        Self {
            clock,
            config: config.validated(),
        }
    }

    /// Issues a token for `user_id`, valid for the configured duration.
    pub fn issue(&self, user_id: UserId) -> IssuedToken {
        let issued_at = self.clock.now();
        let nanos = issued_at
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or_default();
        let token = format!(
            "{:032x}{:016x}{}",
            user_id.as_u128(),
            nanos,
            random_hex()
        );

        IssuedToken {
            token: SessionToken::new(token),
            issued_at,
            expires_at: issued_at + self.config.session_duration(),
        }
    }
}

/// 16 random bytes (128 bits) as 32 lowercase hex characters.
fn random_hex() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeDelta;

    use super::*;
    use crate::ManualClock;

    fn issuer() -> (TokenIssuer<ManualClock>, ManualClock) {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        (TokenIssuer::new(SessionConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn test_issue_expires_after_configured_duration() {
        let (issuer, clock) = issuer();

        let issued = issuer.issue(UserId::random());

        assert_eq!(issued.issued_at, clock.now());
        assert_eq!(issued.expires_at, clock.now() + TimeDelta::hours(8));
    }

    #[test]
    fn test_issue_same_instant_same_user_still_unique() {
        // The clock never moves here, so only the random part differs.
        let (issuer, _clock) = issuer();
        let user = UserId::random();

        let tokens: HashSet<_> = (0..1_000).map(|_| issuer.issue(user).token).collect();

        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn test_issue_token_is_96_hex_chars() {
        let (issuer, _clock) = issuer();

        let issued = issuer.issue(UserId::random());
        let text = issued.token.as_str();

        assert_eq!(text.len(), 32 + 16 + 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_issue_clock_before_epoch_zeroes_time_component() {
        let clock = ManualClock::new(DateTime::from_timestamp(-86_400, 0).unwrap());
        let issuer = TokenIssuer::new(SessionConfig::default(), clock);

        let issued = issuer.issue(UserId::random());
        let text = issued.token.as_str();

        assert_eq!(text.len(), 32 + 16 + 32);
        assert_eq!(&text[32..48], "0000000000000000");
    }
}
