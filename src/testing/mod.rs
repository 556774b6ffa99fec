//! Testing utilities
//!
//! Stub authorization capability and shared fixtures used by the unit tests
//! and, behind the `testing` feature, by the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use crate::errors::AuthError;
use crate::models::TokenRecord;
use crate::oauth::AuthorizationFlow;
use crate::session::retry::RetryPolicy;
use crate::settings::OAuthConfig;

/// Fixed far-future expiry so fixture records compare equal across calls and
/// survive a store round trip unchanged (whole-second precision).
#[must_use]
pub fn fixture_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()
}

/// A credential set with every field populated.
#[must_use]
pub fn token_record() -> TokenRecord {
    TokenRecord {
        access_token: "abc".to_string(),
        refresh_token: Some("def".to_string()),
        id_token: Some("ghi".to_string()),
        token_type: Some("Bearer".to_string()),
        scopes: Some(vec!["openid".to_string(), "profile".to_string()]),
        expires_at: Some(fixture_expiry()),
    }
}

/// The credential set a refresh exchange hands back.
#[must_use]
pub fn refreshed_record() -> TokenRecord {
    TokenRecord {
        access_token: "abc2".to_string(),
        refresh_token: Some("def2".to_string()),
        id_token: Some("ghi2".to_string()),
        token_type: Some("Bearer".to_string()),
        scopes: Some(vec!["openid".to_string(), "profile".to_string()]),
        expires_at: Some(fixture_expiry()),
    }
}

/// A complete, valid provider configuration.
#[must_use]
pub fn test_config() -> OAuthConfig {
    OAuthConfig {
        client_id: "mobile-app".to_string(),
        client_secret: None,
        redirect_url: "com.example.app:/oauth/callback".to_string(),
        issuer: "https://issuer.example.com".to_string(),
        scopes: vec!["openid".to_string(), "profile".to_string()],
        post_logout_redirect_url: Some("com.example.app:/logout-callback".to_string()),
    }
}

/// A retry policy with negligible delays so retry paths run in milliseconds.
#[must_use]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        network_timeout: Duration::from_millis(200),
    }
}

/// Programmable [`AuthorizationFlow`] stub.
///
/// Each operation pops a queued result if one was pushed, otherwise clones a
/// fallback (success by default). Call counters expose how often the
/// controller actually reached the capability, and `hold_authorize` parks
/// authorize calls on a semaphore so in-flight overlap can be exercised.
pub struct StubFlow {
    authorize_calls: AtomicU32,
    refresh_calls: AtomicU32,
    end_session_calls: AtomicU32,
    authorize_queue: Mutex<VecDeque<Result<TokenRecord, AuthError>>>,
    authorize_fallback: Mutex<Result<TokenRecord, AuthError>>,
    refresh_queue: Mutex<VecDeque<Result<TokenRecord, AuthError>>>,
    refresh_fallback: Mutex<Result<TokenRecord, AuthError>>,
    end_session_fallback: Mutex<Result<(), AuthError>>,
    end_session_hints: Mutex<Vec<String>>,
    hold_authorize: AtomicBool,
    authorize_gate: Semaphore,
    hold_end_session: AtomicBool,
    end_session_gate: Semaphore,
}

impl Default for StubFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl StubFlow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            authorize_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            end_session_calls: AtomicU32::new(0),
            authorize_queue: Mutex::new(VecDeque::new()),
            authorize_fallback: Mutex::new(Ok(token_record())),
            refresh_queue: Mutex::new(VecDeque::new()),
            refresh_fallback: Mutex::new(Ok(refreshed_record())),
            end_session_fallback: Mutex::new(Ok(())),
            end_session_hints: Mutex::new(Vec::new()),
            hold_authorize: AtomicBool::new(false),
            authorize_gate: Semaphore::new(0),
            hold_end_session: AtomicBool::new(false),
            end_session_gate: Semaphore::new(0),
        }
    }

    /// Queue a one-shot authorize result, consumed before the fallback.
    pub fn push_authorize(&self, result: Result<TokenRecord, AuthError>) {
        self.authorize_queue.lock().unwrap().push_back(result);
    }

    /// Make every subsequent authorize call fail with `err`.
    pub fn fail_authorize(&self, err: AuthError) {
        *self.authorize_fallback.lock().unwrap() = Err(err);
    }

    /// Queue a one-shot refresh result, consumed before the fallback.
    pub fn push_refresh(&self, result: Result<TokenRecord, AuthError>) {
        self.refresh_queue.lock().unwrap().push_back(result);
    }

    /// Make every subsequent refresh call fail with `err`.
    pub fn fail_refresh(&self, err: AuthError) {
        *self.refresh_fallback.lock().unwrap() = Err(err);
    }

    /// Make every subsequent end-session call fail with `err`.
    pub fn fail_end_session(&self, err: AuthError) {
        *self.end_session_fallback.lock().unwrap() = Err(err);
    }

    /// Park authorize calls on the internal gate until released.
    pub fn hold_authorize(&self) {
        self.hold_authorize.store(true, Ordering::SeqCst);
    }

    /// Let `n` parked authorize calls proceed.
    pub fn release_authorize(&self, n: usize) {
        self.authorize_gate.add_permits(n);
    }

    /// Park end-session calls on the internal gate until released.
    pub fn hold_end_session(&self) {
        self.hold_end_session.store(true, Ordering::SeqCst);
    }

    /// Let `n` parked end-session calls proceed.
    pub fn release_end_session(&self, n: usize) {
        self.end_session_gate.add_permits(n);
    }

    #[must_use]
    pub fn authorize_calls(&self) -> u32 {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn end_session_calls(&self) -> u32 {
        self.end_session_calls.load(Ordering::SeqCst)
    }

    /// The `id_token_hint` values passed to end-session, in call order.
    #[must_use]
    pub fn end_session_hints(&self) -> Vec<String> {
        self.end_session_hints.lock().unwrap().clone()
    }

    fn next_authorize(&self) -> Result<TokenRecord, AuthError> {
        if let Some(result) = self.authorize_queue.lock().unwrap().pop_front() {
            return result;
        }
        self.authorize_fallback.lock().unwrap().clone()
    }

    fn next_refresh(&self) -> Result<TokenRecord, AuthError> {
        if let Some(result) = self.refresh_queue.lock().unwrap().pop_front() {
            return result;
        }
        self.refresh_fallback.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationFlow for StubFlow {
    async fn authorize(&self, _config: &OAuthConfig) -> Result<TokenRecord, AuthError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_authorize.load(Ordering::SeqCst) {
            match self.authorize_gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_closed) => {}
            }
        }
        self.next_authorize()
    }

    async fn refresh(
        &self,
        _config: &OAuthConfig,
        _refresh_token: &str,
    ) -> Result<TokenRecord, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.next_refresh()
    }

    async fn end_session(&self, _config: &OAuthConfig, id_token: &str) -> Result<(), AuthError> {
        self.end_session_calls.fetch_add(1, Ordering::SeqCst);
        self.end_session_hints
            .lock()
            .unwrap()
            .push(id_token.to_string());
        if self.hold_end_session.load(Ordering::SeqCst) {
            match self.end_session_gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_closed) => {}
            }
        }
        self.end_session_fallback.lock().unwrap().clone()
    }
}
