use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Url;
use sha2::{Digest, Sha256};

use super::credentials::{complete_sign_in, exchange_failed, SignIn};
use super::error::AuthError;
use super::providers::IdentityProvider;
use crate::config::OidcConfig;

/// Pending browser sign-in returned by [`BrowserLogin::start`].
///
/// The caller sends the user to `authorize_url` and later hands the
/// provider's redirect back to [`BrowserLogin::complete`].
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub authorize_url: String,
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Authorization-code sign-in with PKCE (S256).
pub struct BrowserLogin {
    config: OidcConfig,
    provider: Arc<dyn IdentityProvider>,
}

impl BrowserLogin {
    pub fn new(config: OidcConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { config, provider }
    }

    /// Generate `state` and a PKCE verifier, and build the authorize URL.
    pub fn start(&self) -> Result<AuthorizationSession, AuthError> {
        let redirect_uri = self.config.redirect_uri.clone().ok_or_else(|| {
            AuthError::Configuration("redirect_uri is required for browser sign-in".to_string())
        })?;
        let state = random_hex(16);
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);

        let mut url = Url::parse(&self.config.authorization_endpoint())
            .map_err(|err| AuthError::Configuration(format!("Invalid issuer URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthorizationSession {
            authorize_url: url.into(),
            state,
            code_verifier,
            redirect_uri,
        })
    }

    /// Finish a browser sign-in.
    ///
    /// `callback` may be the full redirect URL, a `code#state` pair, or a
    /// bare code. When a state is present it must match the session.
    pub async fn complete(
        &self,
        session: &AuthorizationSession,
        callback: &str,
        now: DateTime<Utc>,
    ) -> Result<SignIn, AuthError> {
        let params = parse_callback(callback)?;
        if let Some(returned) = params.state {
            if returned != session.state {
                return Err(AuthError::StateMismatch {
                    expected: session.state.clone(),
                    actual: returned,
                });
            }
        }
        let tokens = self
            .provider
            .exchange_code(&params.code, &session.redirect_uri, &session.code_verifier)
            .await
            .map_err(exchange_failed)?;
        complete_sign_in(self.provider.as_ref(), tokens, now).await
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CallbackParams {
    code: String,
    state: Option<String>,
}

fn parse_callback(input: &str) -> Result<CallbackParams, AuthError> {
    let input = input.trim();
    if let Ok(url) = Url::parse(input) {
        if matches!(url.scheme(), "http" | "https") {
            return parse_callback_url(&url);
        }
    }
    let (code, state) = match input.split_once('#') {
        Some((code, state)) => (code, Some(state.to_string())),
        None => (input, None),
    };
    if code.is_empty() {
        return Err(AuthError::InvalidResponse(
            "callback is missing the authorization code".to_string(),
        ));
    }
    Ok(CallbackParams {
        code: code.to_string(),
        state,
    })
}

fn parse_callback_url(url: &Url) -> Result<CallbackParams, AuthError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        let detail = error_description.map(|d| format!(": {d}")).unwrap_or_default();
        return Err(AuthError::CredentialExchangeFailed(format!(
            "authorization denied ({error}){detail}"
        )));
    }
    let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
        AuthError::InvalidResponse("callback is missing the authorization code".to_string())
    })?;
    Ok(CallbackParams { code, state })
}

fn random_hex(byte_count: usize) -> String {
    random_bytes(byte_count)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn generate_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(32))
}

fn compute_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_bytes(byte_count: usize) -> Vec<u8> {
    let mut buf = vec![0u8; byte_count];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len();
        chunk.copy_from_slice(&id.as_bytes()[..len]);
    }
    buf
}
