#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use oidc_session::auth::{Clock, KeycloakProvider, TokenRecord};
use oidc_session::config::OidcConfig;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const REALM_PATH: &str = "/realms/test";
pub const TOKEN_PATH: &str = "/realms/test/protocol/openid-connect/token";
pub const USERINFO_PATH: &str = "/realms/test/protocol/openid-connect/userinfo";
pub const LOGOUT_PATH: &str = "/realms/test/protocol/openid-connect/logout";
pub const REDIRECT_URI: &str = "http://localhost:3000/api/auth/callback/keycloak";

/// Clock pinned to a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(secs: i64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(instant(secs)),
        })
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

pub fn instant(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).expect("valid timestamp")
}

pub fn config_for(server: &MockServer) -> OidcConfig {
    OidcConfig::builder()
        .issuer(format!("{}{REALM_PATH}", server.uri()))
        .client_id("dashboard")
        .client_secret("s3cr3t")
        .redirect_uri(REDIRECT_URI)
        .build()
}

pub fn provider_for(server: &MockServer) -> Arc<KeycloakProvider> {
    Arc::new(KeycloakProvider::new(config_for(server)).expect("provider"))
}

pub fn token_body(access: &str, refresh: Option<&str>, id: Option<&str>, expires_in: i64) -> Value {
    let mut body = json!({
        "access_token": access,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "openid profile email"
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    if let Some(id) = id {
        body["id_token"] = json!(id);
    }
    body
}

pub fn userinfo_body() -> Value {
    json!({
        "sub": "f3e1d0c2-7a51-4c1e-9c55-0b8f2d6f1a11",
        "preferred_username": "hyurt",
        "name": "Demo User",
        "email": "hyurt@example.com",
        "email_verified": true,
        "realm_access": {"roles": ["admin"]}
    })
}

pub fn record(expires_at: Option<i64>) -> TokenRecord {
    TokenRecord {
        id_token: Some("id-1".to_string()),
        access_token: Some("access-1".to_string()),
        refresh_token: Some("refresh-1".to_string()),
        expires_at,
        error: None,
    }
}
