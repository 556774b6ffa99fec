#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Client-side OAuth2/OIDC authorization-code session lifecycle management.
//!
//! The crate drives the full session lifecycle: interactive authorization,
//! atomic persistence of the resulting credential set, revalidation whenever
//! the application regains focus, token refresh ahead of RP-initiated logout,
//! and fail-open local session termination. The interactive authorization
//! broker and the key-value persistence backend are consumed as capabilities
//! ([`AuthorizationFlow`] and [`store::KeyValueStore`]); UI layers observe
//! [`SessionState`] through a watch channel and never need retry logic of
//! their own.

/// Version of the oidc-session crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod models;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{AuthError, ErrorKind};
pub use models::{SessionState, TokenRecord};
pub use oauth::AuthorizationFlow;
pub use session::{LogoutReport, RetryPolicy, SessionController};
pub use settings::{OAuthConfig, OidcSettings};
pub use store::TokenStore;
