//! OpenID Connect sign-in and access-token refresh for session layers.
//!
//! Signs users in against a Keycloak-style provider (password grant or
//! browser redirect with PKCE), keeps each session's token record fresh by
//! refreshing it shortly before expiry, and drops sessions whose refresh
//! failed.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_session::prelude::*;
//!
//! # async fn example() -> Result<(), AuthError> {
//! let config = OidcConfig::from_env()?;
//! let sessions = SessionManager::keycloak(config, Arc::new(FileSessionStore::new_default()))?;
//! let session = sessions.sign_in_with_password("hyurt", "admin").await?;
//! let current = sessions.current_session(&session.id).await?;
//! assert!(current.is_some());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod prelude;
pub mod session;

#[cfg(feature = "cli")]
pub mod cli;
