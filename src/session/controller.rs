//! Session controller state machine
//!
//! The controller is the single owner of the in-memory session state and the
//! only writer of the token store. Its three operations (`check_session`,
//! `login`, `logout`) are single-flight: a gate mutex guarantees at most one
//! state transition runs at a time, and overlapping revalidation triggers
//! coalesce onto the in-flight result instead of starting a second one.
//!
//! Lifecycle invariants enforced here:
//! - login retries transient failures under bounded exponential backoff and
//!   ends in `Failed(LoginExhausted)` once the cap is hit, never recursing;
//! - logout is fail-open: the local store is cleared and the state returns to
//!   `Unauthenticated` no matter what the refresh or end-session calls do;
//! - every network exchange is bounded by the policy's timeout, classified as
//!   a `NetworkFailure` on elapse.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout};

use crate::errors::{AuthError, ErrorKind};
use crate::models::{SessionState, TokenRecord};
use crate::oauth::AuthorizationFlow;
use crate::session::retry::RetryPolicy;
use crate::settings::OAuthConfig;
use crate::store::TokenStore;

/// Outcome of a logout. Remote failures on the logout path never prevent
/// local termination; they are collected here for the caller's visibility.
#[derive(Debug, Default)]
pub struct LogoutReport {
    /// The pre-logout refresh exchange failed; end-session was skipped.
    pub refresh_error: Option<AuthError>,
    /// The end-session call failed; the server-side session may survive.
    pub end_session_error: Option<AuthError>,
    /// Persisting or clearing the store failed along the way.
    pub storage_error: Option<AuthError>,
    /// The automatic login after local termination failed.
    pub login_error: Option<AuthError>,
}

impl LogoutReport {
    /// True when every step, including the follow-up login, succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.refresh_error.is_none()
            && self.end_session_error.is_none()
            && self.storage_error.is_none()
            && self.login_error.is_none()
    }
}

/// Owns the session state machine and serializes all lifecycle operations.
pub struct SessionController {
    flow: Arc<dyn AuthorizationFlow>,
    store: TokenStore,
    retry: RetryPolicy,
    state: watch::Sender<SessionState>,
    // Single-flight gate for {check_session, login, logout}.
    gate: Mutex<()>,
}

impl SessionController {
    #[must_use]
    pub fn new(flow: Arc<dyn AuthorizationFlow>, store: TokenStore, retry: RetryPolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            flow,
            store,
            retry,
            state,
            gate: Mutex::new(()),
        }
    }

    /// Snapshot of the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes. UI layers react to the variants and never
    /// need retry logic of their own.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Revalidate the session, typically on a focus event.
    ///
    /// Reads the store; a missing, empty or expired access token counts as no
    /// session and triggers a login. A trigger arriving while another
    /// operation is in flight coalesces onto it and returns the current
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError::StorageFailure`] if the store cannot be read,
    /// or any error from the login this check escalated into.
    pub async fn check_session(&self, config: &OAuthConfig) -> Result<SessionState, AuthError> {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!("session check coalesced; another operation is in flight");
            return Ok(self.state());
        };

        match self.store.load().await {
            Ok(Some(record)) if record.is_valid_at(Utc::now()) => {
                debug!("stored session is valid");
                let state = SessionState::Authenticated(record);
                self.publish(state.clone());
                Ok(state)
            }
            Ok(Some(_)) => {
                info!("stored access token is expired; treating as no session");
                self.publish(SessionState::Unauthenticated);
                self.run_login(config).await
            }
            Ok(None) => {
                debug!("no stored session; starting login");
                self.publish(SessionState::Unauthenticated);
                self.run_login(config).await
            }
            Err(err) => {
                let err = AuthError::from(err);
                self.publish(SessionState::Failed {
                    kind: err.kind(),
                    last_record: None,
                });
                Err(err)
            }
        }
    }

    /// Start an interactive login. Coalesces like [`Self::check_session`]
    /// when another operation is already running.
    ///
    /// # Errors
    ///
    /// Returns the terminal error once the bounded retry policy gives up, or
    /// immediately for non-retryable failures (denial, cancellation).
    pub async fn login(&self, config: &OAuthConfig) -> Result<SessionState, AuthError> {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!("login coalesced; another operation is in flight");
            return Ok(self.state());
        };
        self.run_login(config).await
    }

    /// Log out: refresh to obtain a fresh identity token, call end-session
    /// with it, then clear the local session and immediately start a new
    /// login. Local termination is unconditional once the credential guard
    /// passes; remote failures are reported, never blocking.
    ///
    /// A logout is a deliberate user action, so it waits for the gate instead
    /// of being dropped when another operation is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] when there is no
    /// authenticated session, no refresh token, or no identity token. In that
    /// case neither the state nor the store is touched.
    pub async fn logout(&self, config: &OAuthConfig) -> Result<LogoutReport, AuthError> {
        let _guard = self.gate.lock().await;

        let SessionState::Authenticated(record) = self.state() else {
            return Err(AuthError::MissingCredential("no authenticated session"));
        };
        let Some(refresh_token) = record.refresh_token.clone().filter(|t| !t.is_empty()) else {
            return Err(AuthError::MissingCredential("refresh token"));
        };
        let Some(stored_id_token) = record.id_token.clone().filter(|t| !t.is_empty()) else {
            return Err(AuthError::MissingCredential("id token"));
        };

        let mut report = LogoutReport::default();

        self.publish(SessionState::Refreshing(record.clone()));
        match self.bounded(self.flow.refresh(config, &refresh_token)).await {
            Ok(refreshed) => {
                if let Err(err) = self.store.save(&refreshed).await {
                    warn!("could not persist refreshed tokens: {err}");
                    report.storage_error = Some(err.into());
                }
                // End-session endpoints want a recent id_token_hint; fall
                // back to the stored one if the refresh response omits it.
                let id_token = refreshed
                    .id_token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(stored_id_token);

                self.publish(SessionState::LoggingOut(refreshed));
                if let Err(err) = self.bounded(self.flow.end_session(config, &id_token)).await {
                    warn!("end-session call failed: {err}; clearing local session anyway");
                    report.end_session_error = Some(err);
                }
            }
            Err(err) => {
                warn!("token refresh before logout failed: {err}; clearing local session anyway");
                report.refresh_error = Some(err);
            }
        }

        // Fail-open: the user must never be left unable to log out locally.
        if let Err(err) = self.store.clear().await {
            warn!("failed to clear token store during logout: {err}");
            report.storage_error = Some(err.into());
        }
        self.publish(SessionState::Unauthenticated);
        info!("local session terminated");

        report.login_error = self.run_login(config).await.err();
        Ok(report)
    }

    /// Bounded login loop. Caller must hold the gate.
    async fn run_login(&self, config: &OAuthConfig) -> Result<SessionState, AuthError> {
        let mut attempt: u32 = 0;
        loop {
            self.publish(SessionState::Authorizing { attempt });

            match self.bounded(self.flow.authorize(config)).await {
                Ok(record) => return self.complete_login(record).await,
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    if self.retry.attempts_exhausted(attempt) {
                        warn!("login abandoned after {attempt} failed attempts: {err}");
                        self.publish(SessionState::Failed {
                            kind: ErrorKind::LoginExhausted,
                            last_record: None,
                        });
                        return Err(AuthError::LoginExhausted { attempts: attempt });
                    }
                    let delay = self.retry.delay_for(attempt);
                    debug!("login attempt {attempt} failed ({err}); retrying in {delay:?}");
                    sleep(delay).await;
                }
                Err(err) => {
                    // Denial and cancellation are user/server decisions, not
                    // transient faults; cancellation never consumes an
                    // attempt.
                    info!("login not retried: {err}");
                    self.publish(SessionState::Failed {
                        kind: err.kind(),
                        last_record: None,
                    });
                    return Err(err);
                }
            }
        }
    }

    async fn complete_login(&self, record: TokenRecord) -> Result<SessionState, AuthError> {
        if let Err(err) = self.store.save(&record).await {
            // The write may not have taken effect; do not pretend the
            // session is durable.
            let err = AuthError::from(err);
            self.publish(SessionState::Failed {
                kind: err.kind(),
                last_record: Some(record),
            });
            return Err(err);
        }
        info!("login succeeded; session persisted");
        let state = SessionState::Authenticated(record);
        self.publish(state.clone());
        Ok(state)
    }

    /// Bound a capability call by the policy's network timeout.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, AuthError>> + Send,
    ) -> Result<T, AuthError> {
        match timeout(self.retry.network_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::NetworkFailure(format!(
                "exchange timed out after {:?}",
                self.retry.network_timeout
            ))),
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}
