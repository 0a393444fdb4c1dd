//! Tests for loading configuration from the process environment.

use std::sync::{Mutex, OnceLock};

use oidc_session::auth::AuthError;
use oidc_session::config::{OidcConfig, DEFAULT_REFRESH_SKEW_SECS, DEFAULT_SCOPE};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 7] = [
    "KEYCLOAK_ISSUER",
    "KEYCLOAK_CLIENT_ID",
    "KEYCLOAK_CLIENT_SECRET",
    "OIDC_SCOPE",
    "OIDC_REDIRECT_URI",
    "OIDC_REFRESH_SKEW_SECS",
    "OIDC_HTTP_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_config_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn from_env_reads_keycloak_variables() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("KEYCLOAK_ISSUER", "http://localhost:8080/realms/demo/");
    std::env::set_var("KEYCLOAK_CLIENT_ID", "dashboard");
    std::env::set_var("KEYCLOAK_CLIENT_SECRET", "s3cr3t");

    let config = OidcConfig::from_env().expect("config");

    assert_eq!(config.client_id, "dashboard");
    assert_eq!(config.scope, DEFAULT_SCOPE);
    assert_eq!(config.refresh_skew_secs, DEFAULT_REFRESH_SKEW_SECS);
    assert!(config.redirect_uri.is_none());
    assert_eq!(
        config.userinfo_endpoint(),
        "http://localhost:8080/realms/demo/protocol/openid-connect/userinfo"
    );
}

#[test]
fn from_env_applies_optional_overrides() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("KEYCLOAK_ISSUER", "https://sso.example.com/realms/demo");
    std::env::set_var("KEYCLOAK_CLIENT_ID", "dashboard");
    std::env::set_var("KEYCLOAK_CLIENT_SECRET", "s3cr3t");
    std::env::set_var("OIDC_SCOPE", "openid");
    std::env::set_var("OIDC_REDIRECT_URI", "http://localhost:3000/callback");
    std::env::set_var("OIDC_REFRESH_SKEW_SECS", "120");
    std::env::set_var("OIDC_HTTP_TIMEOUT_SECS", "5");

    let config = OidcConfig::from_env().expect("config");

    assert_eq!(config.scope, "openid");
    assert_eq!(
        config.redirect_uri.as_deref(),
        Some("http://localhost:3000/callback")
    );
    assert_eq!(config.refresh_skew_secs, 120);
    assert_eq!(config.http_timeout().as_secs(), 5);
}

#[test]
fn from_env_requires_issuer() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();
    std::env::set_var("KEYCLOAK_CLIENT_ID", "dashboard");
    std::env::set_var("KEYCLOAK_CLIENT_SECRET", "s3cr3t");

    let err = OidcConfig::from_env().unwrap_err();
    assert!(
        matches!(&err, AuthError::Configuration(msg) if msg.contains("KEYCLOAK_ISSUER")),
        "unexpected error: {err:?}"
    );
}

#[test]
fn debug_output_redacts_client_secret() {
    let config = OidcConfig::builder()
        .issuer("https://sso.example.com/realms/demo")
        .client_id("dashboard")
        .client_secret("s3cr3t")
        .build();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("s3cr3t"));
    assert!(rendered.contains("<redacted>"));
}
