//! Error taxonomy for the session lifecycle
//!
//! Transient classes (`NetworkFailure`, `TokenExchangeFailure`) are retried by
//! the controller under bounded exponential backoff; everything else surfaces
//! immediately. Failures on the logout path never block local session
//! termination and are carried in a [`crate::session::LogoutReport`] instead.

use thiserror::Error;

/// Errors produced by the authorization capability, the token store and the
/// session controller.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The user or the server rejected the authorization request.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The user dismissed the interactive authorization flow. Never consumes
    /// a retry attempt; a dismissal is a decision, not a transient fault.
    #[error("authorization cancelled by user")]
    AuthorizationCancelled,

    /// Transport error or timeout on any exchange with the server.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The server rejected the authorization code or client credentials.
    #[error("token exchange rejected: {0}")]
    TokenExchangeFailure(String),

    /// The refresh token was invalid or expired.
    #[error("token refresh failed: {0}")]
    RefreshFailure(String),

    /// The persistence layer failed; no assumption is made about whether the
    /// write took effect.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Logout was attempted without the credential end-session requires.
    #[error("missing credential for logout: {0}")]
    MissingCredential(&'static str),

    /// The bounded login retry policy ran out of attempts.
    #[error("login abandoned after {attempts} failed attempts")]
    LoginExhausted { attempts: u32 },
}

impl AuthError {
    /// Classification used by [`crate::SessionState::Failed`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            Self::AuthorizationCancelled => ErrorKind::AuthorizationCancelled,
            Self::NetworkFailure(_) => ErrorKind::NetworkFailure,
            Self::TokenExchangeFailure(_) => ErrorKind::TokenExchangeFailure,
            Self::RefreshFailure(_) => ErrorKind::RefreshFailure,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
            Self::MissingCredential(_) => ErrorKind::MissingCredential,
            Self::LoginExhausted { .. } => ErrorKind::LoginExhausted,
        }
    }

    /// Whether the bounded backoff policy may retry this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure(_) | Self::TokenExchangeFailure(_)
        )
    }
}

/// Fieldless mirror of [`AuthError`] for embedding in session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthorizationDenied,
    AuthorizationCancelled,
    NetworkFailure,
    TokenExchangeFailure,
    RefreshFailure,
    StorageFailure,
    MissingCredential,
    LoginExhausted,
}
