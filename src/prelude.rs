//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, AuthorizationSession, Clock, IdentityProvider, KeycloakProvider, SystemClock,
    TokenLifecycleManager, TokenRecord, UserProfile,
};
pub use crate::config::OidcConfig;
pub use crate::session::{
    FileSessionStore, MemorySessionStore, Session, SessionId, SessionManager, SessionStore,
};
