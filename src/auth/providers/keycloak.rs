use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{GrantType, IdentityProvider};
use crate::auth::error::AuthError;
use crate::auth::profile::UserProfile;
use crate::auth::token::TokenSet;
use crate::config::OidcConfig;

/// Keycloak-style OpenID Connect provider over HTTP.
///
/// Endpoints are derived from the configured issuer
/// (`{issuer}/protocol/openid-connect/{token,userinfo,logout}`).
///
/// # Example
/// ```no_run
/// use oidc_session::auth::providers::KeycloakProvider;
/// use oidc_session::config::OidcConfig;
///
/// let config = OidcConfig::builder()
///     .issuer("https://sso.example.com/realms/demo")
///     .client_id("dashboard")
///     .client_secret("s3cr3t")
///     .build();
/// let provider = KeycloakProvider::new(config)?;
/// # Ok::<(), oidc_session::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct KeycloakProvider {
    client: reqwest::Client,
    config: OidcConfig,
}

impl KeycloakProvider {
    pub fn new(config: OidcConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|err| AuthError::Configuration(format!("HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn with_client(config: OidcConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    async fn token_request(
        &self,
        grant: GrantType,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, AuthError> {
        let grant_type: &'static str = grant.into();
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", grant_type),
        ];
        form.extend_from_slice(params);

        debug!(grant = %grant, "Requesting tokens");
        let resp = self
            .client
            .post(self.config.token_endpoint())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(grant = %grant, status = status.as_u16(), "Token request rejected");
            return Err(rejection(status.as_u16(), &body));
        }
        Ok(resp.json::<TokenSet>().await?)
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenSet, AuthError> {
        self.token_request(
            GrantType::Password,
            &[
                ("scope", self.config.scope.as_str()),
                ("username", username),
                ("password", password),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.token_request(GrantType::RefreshToken, &[("refresh_token", refresh_token)])
            .await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, AuthError> {
        self.token_request(
            GrantType::AuthorizationCode,
            &[
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
            ],
        )
        .await
    }

    async fn userinfo(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let resp = self
            .client
            .get(self.config.userinfo_endpoint())
            .header("Accept", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }
        Ok(resp.json::<UserProfile>().await?)
    }

    async fn end_session(&self, refresh_token: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(self.config.logout_endpoint())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

fn rejection(status: u16, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    AuthError::ProviderRejected {
        status,
        error: parsed.error,
        description: parsed.error_description,
    }
}
