//! Identity provider configuration.
//!
//! Configuration is always passed explicitly to providers and managers.
//! Sources, in the order callers usually try them:
//! 1. Code, through [`OidcConfig::builder`]
//! 2. A TOML file ([`OidcConfig::from_toml_file`])
//! 3. Environment variables, after loading `.env` ([`OidcConfig::from_env`])

use std::fmt;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::auth::error::AuthError;

pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const ENV_ISSUER: &str = "KEYCLOAK_ISSUER";
const ENV_CLIENT_ID: &str = "KEYCLOAK_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "KEYCLOAK_CLIENT_SECRET";
const ENV_SCOPE: &str = "OIDC_SCOPE";
const ENV_REDIRECT_URI: &str = "OIDC_REDIRECT_URI";
const ENV_REFRESH_SKEW_SECS: &str = "OIDC_REFRESH_SKEW_SECS";
const ENV_HTTP_TIMEOUT_SECS: &str = "OIDC_HTTP_TIMEOUT_SECS";

/// Client registration and tuning for one OpenID Connect issuer.
///
/// # Example
/// ```
/// use oidc_session::config::OidcConfig;
///
/// let config = OidcConfig::builder()
///     .issuer("https://sso.example.com/realms/demo")
///     .client_id("dashboard")
///     .client_secret("s3cr3t")
///     .build();
/// assert_eq!(
///     config.token_endpoint(),
///     "https://sso.example.com/realms/demo/protocol/openid-connect/token"
/// );
/// ```
#[derive(Clone, Builder, Deserialize)]
pub struct OidcConfig {
    #[builder(into)]
    pub issuer: String,
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(into, default = DEFAULT_SCOPE.to_string())]
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Callback registered with the provider for browser sign-in.
    #[builder(into)]
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[builder(default = DEFAULT_REFRESH_SKEW_SECS)]
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: i64,
    #[builder(default = DEFAULT_HTTP_TIMEOUT_SECS)]
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl OidcConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Backs [`OidcConfig::from_env`]; tests pass a map instead of touching
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AuthError::Configuration(format!("{key} is not set")))
        };
        let config = Self {
            issuer: required(ENV_ISSUER)?,
            client_id: required(ENV_CLIENT_ID)?,
            client_secret: required(ENV_CLIENT_SECRET)?,
            scope: lookup(ENV_SCOPE).unwrap_or_else(default_scope),
            redirect_uri: lookup(ENV_REDIRECT_URI),
            refresh_skew_secs: parse_number(&lookup, ENV_REFRESH_SKEW_SECS)?
                .unwrap_or(DEFAULT_REFRESH_SKEW_SECS),
            http_timeout_secs: parse_number(&lookup, ENV_HTTP_TIMEOUT_SECS)?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file whose keys match the field names.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AuthError::Configuration(format!("Cannot read {}: {err}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if !(self.issuer.starts_with("https://") || self.issuer.starts_with("http://")) {
            return Err(AuthError::Configuration(format!(
                "Issuer must be an http(s) URL, got {}",
                self.issuer
            )));
        }
        if self.refresh_skew_secs < 0 {
            return Err(AuthError::Configuration(
                "refresh_skew_secs must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/protocol/openid-connect/{name}",
            self.issuer.trim_end_matches('/')
        )
    }

    pub fn token_endpoint(&self) -> String {
        self.endpoint("token")
    }

    pub fn userinfo_endpoint(&self) -> String {
        self.endpoint("userinfo")
    }

    pub fn authorization_endpoint(&self) -> String {
        self.endpoint("auth")
    }

    pub fn logout_endpoint(&self) -> String {
        self.endpoint("logout")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_refresh_skew_secs() -> i64 {
    DEFAULT_REFRESH_SKEW_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn parse_number<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AuthError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| AuthError::Configuration(format!("{key} is not a number: {raw}")))
        })
        .transpose()
}
