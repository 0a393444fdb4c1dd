use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::AuthError;
use super::providers::IdentityProvider;
use super::token::{TokenRecord, TokenSet};
use crate::config::{OidcConfig, DEFAULT_REFRESH_SKEW_SECS};

/// Keeps a [`TokenRecord`] either valid or explicitly marked failed.
///
/// The manager holds no per-record state and does not de-duplicate
/// concurrent refreshes of the same record; [`crate::session::SessionManager`]
/// serializes refreshes per session.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use oidc_session::auth::{KeycloakProvider, TokenLifecycleManager, TokenRecord};
/// use oidc_session::config::OidcConfig;
///
/// # async fn example(config: OidcConfig, record: TokenRecord) -> Result<(), oidc_session::auth::AuthError> {
/// let provider = Arc::new(KeycloakProvider::new(config.clone())?);
/// let manager = TokenLifecycleManager::from_config(&config, provider);
/// let record = manager.ensure_fresh(record, chrono::Utc::now()).await;
/// if !record.is_usable() {
///     // force the user to sign in again
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenLifecycleManager {
    provider: Arc<dyn IdentityProvider>,
    skew_secs: i64,
}

impl TokenLifecycleManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            skew_secs: DEFAULT_REFRESH_SKEW_SECS,
        }
    }

    pub fn from_config(config: &OidcConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::new(provider).with_skew_secs(config.refresh_skew_secs)
    }

    pub fn with_skew_secs(mut self, skew_secs: i64) -> Self {
        self.skew_secs = skew_secs.max(0);
        self
    }

    pub fn skew_secs(&self) -> i64 {
        self.skew_secs
    }

    /// Return `record` unchanged while its access token is outside the
    /// refresh window, otherwise refresh it through the provider.
    ///
    /// A failed refresh never surfaces as an error: the returned record
    /// carries [`super::REFRESH_ACCESS_TOKEN_ERROR`] instead. Records that
    /// already carry an error are terminal and returned as-is.
    pub async fn ensure_fresh(&self, record: TokenRecord, now: DateTime<Utc>) -> TokenRecord {
        if !record.is_usable() || !record.needs_refresh(now, self.skew_secs) {
            return record;
        }

        let result = self
            .refresh(&record)
            .await
            .and_then(|tokens| record.refreshed(tokens, now));
        match result {
            Ok(refreshed) => {
                debug!(expires_at = ?refreshed.expires_at, "Access token refreshed");
                refreshed
            }
            Err(err) => {
                warn!(error = %err, "Error refreshing access token");
                record.failed()
            }
        }
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenSet, AuthError> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token stored".to_string()))?;
        debug!(expires_at = ?record.expires_at, "Refreshing access token");
        self.provider
            .refresh(refresh_token)
            .await
            .map_err(|err| AuthError::RefreshFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::auth::profile::UserProfile;
    use crate::auth::token::REFRESH_ACCESS_TOKEN_ERROR;

    #[derive(Default)]
    struct ScriptedProvider {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        async fn password_grant(&self, _: &str, _: &str) -> Result<TokenSet, AuthError> {
            unreachable!("password grant is not used by the lifecycle manager")
        }

        async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthError::ProviderRejected {
                    status: 400,
                    error: Some("invalid_grant".to_string()),
                    description: None,
                });
            }
            Ok(TokenSet {
                access_token: format!("access-from-{refresh_token}"),
                id_token: None,
                refresh_token: None,
                expires_in: 300,
                token_type: Some("Bearer".to_string()),
                scope: None,
            })
        }

        async fn exchange_code(&self, _: &str, _: &str, _: &str) -> Result<TokenSet, AuthError> {
            unreachable!("code exchange is not used by the lifecycle manager")
        }

        async fn userinfo(&self, _: &str) -> Result<UserProfile, AuthError> {
            unreachable!("userinfo is not used by the lifecycle manager")
        }

        async fn end_session(&self, _: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn record(expires_at: Option<i64>) -> TokenRecord {
        TokenRecord {
            id_token: Some("id".to_string()),
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            error: None,
        }
    }

    fn manager(provider: &Arc<ScriptedProvider>) -> TokenLifecycleManager {
        TokenLifecycleManager::new(provider.clone())
    }

    #[tokio::test]
    async fn record_without_expiry_is_returned_unchanged() {
        let provider = Arc::new(ScriptedProvider::default());
        let out = manager(&provider)
            .ensure_fresh(record(None), at(10_000))
            .await;
        assert_eq!(out, record(None));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_inside_skew_window() {
        let provider = Arc::new(ScriptedProvider::default());
        let out = manager(&provider)
            .ensure_fresh(record(Some(1_030)), at(1_000))
            .await;
        assert_eq!(out.access_token.as_deref(), Some("access-from-refresh"));
        assert_eq!(out.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(out.id_token.as_deref(), Some("id"));
        assert_eq!(out.expires_at, Some(1_300));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_skew_is_applied() {
        let provider = Arc::new(ScriptedProvider::default());
        let manager = manager(&provider).with_skew_secs(10);
        let out = manager.ensure_fresh(record(Some(1_030)), at(1_000)).await;
        assert_eq!(out, record(Some(1_030)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn negative_skew_is_clamped() {
        let provider = Arc::new(ScriptedProvider::default());
        assert_eq!(manager(&provider).with_skew_secs(-5).skew_secs(), 0);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_network() {
        let provider = Arc::new(ScriptedProvider::default());
        let input = TokenRecord {
            refresh_token: None,
            ..record(Some(500))
        };
        let out = manager(&provider)
            .ensure_fresh(input.clone(), at(1_000))
            .await;
        assert_eq!(out.error.as_deref(), Some(REFRESH_ACCESS_TOKEN_ERROR));
        assert_eq!(TokenRecord { error: None, ..out }, input);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_marks_record() {
        let provider = Arc::new(ScriptedProvider {
            fail: true,
            ..Default::default()
        });
        let out = manager(&provider)
            .ensure_fresh(record(Some(500)), at(1_000))
            .await;
        assert_eq!(out, record(Some(500)).failed());
    }

    #[tokio::test]
    async fn failed_record_is_terminal() {
        let provider = Arc::new(ScriptedProvider::default());
        let failed = record(Some(500)).failed();
        let out = manager(&provider)
            .ensure_fresh(failed.clone(), at(1_000))
            .await;
        assert_eq!(out, failed);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
