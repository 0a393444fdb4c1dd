//! Session layer on top of the token lifecycle.
//!
//! A session is created by a successful sign-in and read through
//! [`SessionManager::current_session`], which refreshes the access token
//! when needed. A session whose refresh failed is dropped and reads as
//! `None`; callers must send the user back through sign-in.

pub mod store;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::credentials::{CredentialsLogin, SignIn};
use crate::auth::error::AuthError;
use crate::auth::lifecycle::TokenLifecycleManager;
use crate::auth::pkce::{AuthorizationSession, BrowserLogin};
use crate::auth::profile::UserProfile;
use crate::auth::providers::{IdentityProvider, KeycloakProvider};
use crate::config::OidcConfig;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An authenticated session as seen by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub user: UserProfile,
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn from_stored(id: SessionId, stored: &StoredSession) -> Self {
        Self {
            id,
            user: stored.user.clone(),
            access_token: stored.record.access_token.clone(),
            expires_at: stored.record.expires_at_utc(),
        }
    }
}

/// Creates, reads and ends sessions.
///
/// Reads of one session are serialized, so concurrent callers trigger at
/// most one refresh per session; different sessions never wait on each other.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use oidc_session::config::OidcConfig;
/// use oidc_session::session::{MemorySessionStore, SessionManager};
///
/// # async fn example() -> Result<(), oidc_session::auth::AuthError> {
/// let config = OidcConfig::from_env()?;
/// let sessions = SessionManager::keycloak(config, Arc::new(MemorySessionStore::new()))?;
/// let session = sessions.sign_in_with_password("hyurt", "admin").await?;
/// match sessions.current_session(&session.id).await? {
///     Some(session) => println!("token: {:?}", session.access_token),
///     None => println!("signed out"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    lifecycle: TokenLifecycleManager,
    credentials: CredentialsLogin,
    browser: BrowserLogin,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        config: OidcConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            lifecycle: TokenLifecycleManager::from_config(&config, provider.clone()),
            credentials: CredentialsLogin::new(provider.clone()),
            browser: BrowserLogin::new(config, provider.clone()),
            provider,
            store,
            clock: Arc::new(SystemClock),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Manager backed by a [`KeycloakProvider`] built from `config`.
    pub fn keycloak(config: OidcConfig, store: Arc<dyn SessionStore>) -> Result<Self, AuthError> {
        let provider = Arc::new(KeycloakProvider::new(config.clone())?);
        Ok(Self::new(config, provider, store))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn sign_in_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let sign_in = self
            .credentials
            .sign_in(username, password, self.clock.now())
            .await?;
        self.create_session(sign_in)
    }

    /// Begin a browser sign-in; see [`BrowserLogin::start`].
    pub fn start_browser_sign_in(&self) -> Result<AuthorizationSession, AuthError> {
        self.browser.start()
    }

    /// Finish a browser sign-in with the provider's redirect.
    pub async fn sign_in_with_callback(
        &self,
        authorization: &AuthorizationSession,
        callback: &str,
    ) -> Result<Session, AuthError> {
        let sign_in = self
            .browser
            .complete(authorization, callback, self.clock.now())
            .await?;
        self.create_session(sign_in)
    }

    /// The session for `id` with a fresh access token.
    ///
    /// Returns `Ok(None)` when the session is unknown or its token could not
    /// be refreshed; in the latter case the session is removed.
    pub async fn current_session(&self, id: &SessionId) -> Result<Option<Session>, AuthError> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let Some(stored) = self.store.load(id)? else {
            self.forget_lock(id);
            return Ok(None);
        };

        let record = self
            .lifecycle
            .ensure_fresh(stored.record.clone(), self.clock.now())
            .await;
        if !record.is_usable() {
            warn!(session_id = %id, "Dropping session after failed token refresh");
            self.store.clear(id)?;
            self.forget_lock(id);
            return Ok(None);
        }

        if record == stored.record {
            return Ok(Some(Session::from_stored(id.clone(), &stored)));
        }
        let updated = StoredSession { record, ..stored };
        self.store.save(id, &updated)?;
        Ok(Some(Session::from_stored(id.clone(), &updated)))
    }

    /// Stored state for `id` without refreshing anything.
    pub fn inspect(&self, id: &SessionId) -> Result<Option<StoredSession>, AuthError> {
        self.store.load(id)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionId>, AuthError> {
        self.store.list()
    }

    /// Remove the session and end it at the provider.
    ///
    /// Returns whether a session existed. The provider call is best-effort:
    /// its failure is logged and does not keep the session alive.
    pub async fn sign_out(&self, id: &SessionId) -> Result<bool, AuthError> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let stored = self.store.load(id)?;
        self.store.clear(id)?;
        self.forget_lock(id);

        let Some(stored) = stored else {
            return Ok(false);
        };
        if let Some(refresh_token) = stored.record.refresh_token.as_deref() {
            if let Err(err) = self.provider.end_session(refresh_token).await {
                warn!(session_id = %id, error = %err, "Provider sign-out failed");
            }
        }
        debug!(session_id = %id, "Session ended");
        Ok(true)
    }

    fn create_session(&self, sign_in: SignIn) -> Result<Session, AuthError> {
        let id = SessionId::generate();
        let stored = StoredSession {
            record: sign_in.record,
            user: sign_in.user,
            created_at: self.clock.now(),
        };
        self.store.save(&id, &stored)?;
        debug!(session_id = %id, user = ?stored.user.display_name(), "Session created");
        Ok(Session::from_stored(id, &stored))
    }

    fn session_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .clone()
    }

    fn forget_lock(&self, id: &SessionId) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}
