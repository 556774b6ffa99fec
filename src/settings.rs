//! Configuration resolution
//!
//! Settings are resolved the same way at every call site: struct defaults,
//! then an optional TOML file, then per-field environment overrides. The
//! resolved [`OAuthConfig`] is passed by reference into every controller
//! operation instead of being captured as global state, so an issuer or
//! client swap between environments cannot leak into an in-flight exchange.

use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default config file path, overridable with `OIDC_SESSION_CONFIG`.
const DEFAULT_CONFIG_PATH: &str = "Settings.toml";

/// Error raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: basic_toml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level settings: the provider configuration plus retry tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcSettings {
    #[serde(default)]
    pub provider: OAuthConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Read-only provider configuration for the authorization capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Confidential clients only.
    pub client_secret: Option<String>,
    pub redirect_url: String,
    pub issuer: String,
    pub scopes: Vec<String>,
    pub post_logout_redirect_url: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_url: String::new(),
            issuer: String::new(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
            post_logout_redirect_url: None,
        }
    }
}

/// Tuning for the bounded login retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub network_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            network_timeout_secs: 30,
        }
    }
}

impl OidcSettings {
    /// Load settings from the configuration file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the resolved provider configuration is invalid.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_base_settings()?;
        settings.provider.apply_env_overrides();
        settings.provider.validate()?;
        Ok(settings)
    }

    /// Load base settings from TOML if the file exists, defaults otherwise.
    fn load_base_settings() -> Result<Self, SettingsError> {
        let path = std::env::var("OIDC_SESSION_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if !std::path::Path::new(&path).exists() {
            log::debug!("no config file at {path}; using defaults and environment");
            return Ok(Self::default());
        }

        let toml_content = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        basic_toml::from_str(&toml_content)
            .map_err(|source| SettingsError::Parse { path, source })
    }
}

impl OAuthConfig {
    /// Apply environment variable overrides on top of file/default values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = std::env::var("OIDC_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("OIDC_CLIENT_SECRET") {
            self.client_secret = Some(client_secret);
        }
        if let Ok(redirect_url) = std::env::var("OIDC_REDIRECT_URL") {
            self.redirect_url = redirect_url;
        }
        if let Ok(issuer) = std::env::var("OIDC_ISSUER") {
            self.issuer = issuer;
        }
        if let Ok(scopes) = std::env::var("OIDC_SCOPES") {
            self.scopes = scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("OIDC_POST_LOGOUT_REDIRECT_URL") {
            self.post_logout_redirect_url = Some(url);
        }
    }

    /// Validate the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty, the issuer or redirect URL
    /// does not parse, or the scope list lacks `openid` (every flow here is
    /// an OIDC flow and needs an identity token).
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.client_id.is_empty() {
            return Err(SettingsError::Invalid("client_id is empty".to_string()));
        }
        Url::parse(&self.issuer)
            .map_err(|e| SettingsError::Invalid(format!("issuer is not a valid URL: {e}")))?;
        Url::parse(&self.redirect_url)
            .map_err(|e| SettingsError::Invalid(format!("redirect_url is not a valid URL: {e}")))?;
        if let Some(url) = &self.post_logout_redirect_url {
            Url::parse(url).map_err(|e| {
                SettingsError::Invalid(format!("post_logout_redirect_url is not a valid URL: {e}"))
            })?;
        }
        if !self.scopes.iter().any(|s| s == "openid") {
            return Err(SettingsError::Invalid(
                "scopes must include \"openid\"".to_string(),
            ));
        }
        Ok(())
    }
}
