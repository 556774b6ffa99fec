//! Authorization capability contract
//!
//! The interactive broker that performs the redirect dance, the code/token
//! exchange, token refresh and RP-initiated logout is consumed through this
//! trait and never reimplemented here. Platform bindings (a system browser
//! broker, a native app-auth shim, a test stub) provide the implementation;
//! the session controller only sees classified results.

use async_trait::async_trait;

use crate::errors::AuthError;
use crate::models::TokenRecord;
use crate::settings::OAuthConfig;

/// External authorization capability
///
/// Every call receives the resolved configuration explicitly so that a config
/// change between operations (issuer swapped between environments) can never
/// leak a stale snapshot into a new exchange.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Run the interactive authorization-code flow and exchange the code for
    /// a credential set.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthorizationCancelled`] when the user dismisses
    /// the flow, [`AuthError::AuthorizationDenied`] when consent is refused,
    /// and the transient classes for transport or exchange failures.
    async fn authorize(&self, config: &OAuthConfig) -> Result<TokenRecord, AuthError>;

    /// Exchange a refresh token for a fresh credential set without user
    /// interaction.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailure`] when the refresh token is
    /// invalid or expired, or a transient class for transport failures.
    async fn refresh(
        &self,
        config: &OAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenRecord, AuthError>;

    /// Ask the authorization server to terminate its session, passing the
    /// given identity token as `id_token_hint`. Issuer, client id and the
    /// post-logout redirect come from `config`.
    ///
    /// # Errors
    ///
    /// Returns a transient class or [`AuthError::AuthorizationDenied`] when
    /// the server rejects the request. Callers on the logout path treat any
    /// error as non-fatal (fail-open local termination).
    async fn end_session(&self, config: &OAuthConfig, id_token: &str) -> Result<(), AuthError>;
}
