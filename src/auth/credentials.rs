use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::AuthError;
use super::profile::UserProfile;
use super::providers::IdentityProvider;
use super::token::{TokenRecord, TokenSet};

/// Result of a successful initial credential exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SignIn {
    pub record: TokenRecord,
    pub user: UserProfile,
}

/// Username/password sign-in (password grant followed by user-info).
pub struct CredentialsLogin {
    provider: Arc<dyn IdentityProvider>,
}

impl CredentialsLogin {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Exchange credentials for tokens and fetch the user's profile.
    ///
    /// Any failure, including a rejected user-info call, yields
    /// [`AuthError::CredentialExchangeFailed`] and no record.
    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<SignIn, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::CredentialExchangeFailed(
                "username and password are required".to_string(),
            ));
        }
        let tokens = self
            .provider
            .password_grant(username, password)
            .await
            .map_err(exchange_failed)?;
        complete_sign_in(self.provider.as_ref(), tokens, now).await
    }
}

/// Fetch the profile for freshly issued tokens and build the initial record.
pub(crate) async fn complete_sign_in(
    provider: &dyn IdentityProvider,
    tokens: TokenSet,
    now: DateTime<Utc>,
) -> Result<SignIn, AuthError> {
    let access_token = tokens.access_token.clone();
    let record = TokenRecord::issued(tokens, now).map_err(exchange_failed)?;
    let user = provider
        .userinfo(&access_token)
        .await
        .map_err(exchange_failed)?;
    debug!(user = ?user.display_name(), "Credential exchange succeeded");
    Ok(SignIn { record, user })
}

pub(crate) fn exchange_failed(err: AuthError) -> AuthError {
    match err {
        AuthError::CredentialExchangeFailed(_) => err,
        other => AuthError::CredentialExchangeFailed(other.to_string()),
    }
}
