//! Credential set and session state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

/// The persisted credential set obtained from an authorization or refresh
/// exchange.
///
/// The record is always written, replaced and cleared as a single unit; a
/// reader can never observe a half-written record. An empty `access_token`
/// means "no session" regardless of the other fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Required for RP-initiated logout; most end-session endpoints validate
    /// that the supplied `id_token_hint` is recent.
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Whether the record represents a live session: a non-empty access token
    /// that has not passed its expiration date.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    /// An absent `expires_at` never counts as expired; the server simply did
    /// not communicate a lifetime.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Tagged session state owned by the controller, exactly one variant active.
///
/// UI layers observe this through the controller's watch channel and render
/// accordingly; they never need their own retry logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No valid credential set.
    Unauthenticated,
    /// Interactive authorization in flight; `attempt` counts consecutive
    /// failures since the last success.
    Authorizing { attempt: u32 },
    /// A credential set is present.
    Authenticated(TokenRecord),
    /// A refresh exchange is in flight ahead of logout.
    Refreshing(TokenRecord),
    /// The end-session call is in flight.
    LoggingOut(TokenRecord),
    /// Terminal failure for this cycle; never auto-retried.
    Failed {
        kind: ErrorKind,
        last_record: Option<TokenRecord>,
    },
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: Option<DateTime<Utc>>) -> TokenRecord {
        TokenRecord {
            access_token: "at".to_string(),
            refresh_token: None,
            id_token: None,
            token_type: None,
            scopes: None,
            expires_at,
        }
    }

    #[test]
    fn record_without_expiry_is_valid() {
        let now = Utc::now();
        assert!(record(None).is_valid_at(now));
    }

    #[test]
    fn expired_record_is_invalid() {
        let now = Utc::now();
        assert!(record(Some(now - Duration::seconds(1))).is_expired_at(now));
        assert!(!record(Some(now - Duration::seconds(1))).is_valid_at(now));
        assert!(record(Some(now + Duration::hours(1))).is_valid_at(now));
    }

    #[test]
    fn empty_access_token_is_never_valid() {
        let now = Utc::now();
        let mut rec = record(Some(now + Duration::hours(1)));
        rec.access_token = String::new();
        assert!(!rec.is_valid_at(now));
    }

    #[test]
    fn record_serde_round_trip() {
        let rec = TokenRecord {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
            id_token: Some("ghi".to_string()),
            token_type: Some("Bearer".to_string()),
            scopes: Some(vec!["openid".to_string(), "profile".to_string()]),
            expires_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: TokenRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
