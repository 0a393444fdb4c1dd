use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Sentinel stored in [`TokenRecord::error`] after a failed refresh.
pub const REFRESH_ACCESS_TOKEN_ERROR: &str = "RefreshAccessTokenError";

/// Tokens held by a single session.
///
/// `expires_at` is an absolute unix timestamp (seconds) computed as
/// `now + expires_in` when the tokens were issued or last refreshed.
/// A record with `error` set is no longer usable.
///
/// # Example
/// ```
/// use oidc_session::auth::TokenRecord;
///
/// let record = TokenRecord {
///     access_token: Some("access".to_string()),
///     refresh_token: Some("refresh".to_string()),
///     expires_at: Some(1_700_000_300),
///     ..Default::default()
/// };
/// assert!(record.is_usable());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub error: Option<String>,
}

impl TokenRecord {
    /// Build the initial record from a token response received at `now`.
    ///
    /// Fails with [`AuthError::InvalidResponse`] when `expires_in` is not a
    /// usable lifetime.
    pub fn issued(tokens: TokenSet, now: DateTime<Utc>) -> Result<Self, AuthError> {
        let expires_at = tokens.expires_at(now)?;
        Ok(Self {
            id_token: tokens.id_token,
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            expires_at: Some(expires_at),
            error: None,
        })
    }

    /// Apply a refresh response received at `now`.
    ///
    /// The id token and refresh token are only replaced when the provider
    /// returned new ones.
    pub fn refreshed(&self, tokens: TokenSet, now: DateTime<Utc>) -> Result<Self, AuthError> {
        let expires_at = tokens.expires_at(now)?;
        Ok(Self {
            id_token: tokens.id_token.or_else(|| self.id_token.clone()),
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: Some(expires_at),
            error: None,
        })
    }

    /// Copy of this record marked with the refresh failure sentinel.
    pub fn failed(&self) -> Self {
        Self {
            error: Some(REFRESH_ACCESS_TOKEN_ERROR.to_string()),
            ..self.clone()
        }
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the access token is inside the refresh window at `now`.
    ///
    /// Records without an expiry never need refreshing.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now.timestamp() >= expires_at.saturating_sub(skew_secs),
            None => false,
        }
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Absolute expiry for a response received at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<i64, AuthError> {
        if self.expires_in <= 0 {
            return Err(AuthError::InvalidResponse(format!(
                "expires_in must be positive, got {}",
                self.expires_in
            )));
        }
        now.timestamp()
            .checked_add(self.expires_in)
            .filter(|secs| DateTime::<Utc>::from_timestamp(*secs, 0).is_some())
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!(
                    "expires_in out of range: {}",
                    self.expires_in
                ))
            })
    }
}
