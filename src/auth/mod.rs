//! Sign-in flows and the access-token lifecycle.

pub mod clock;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod pkce;
pub mod profile;
pub mod providers;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialsLogin, SignIn};
pub use error::AuthError;
pub use lifecycle::TokenLifecycleManager;
pub use pkce::{AuthorizationSession, BrowserLogin};
pub use profile::UserProfile;
pub use providers::{GrantType, IdentityProvider, KeycloakProvider};
pub use token::{TokenRecord, TokenSet, REFRESH_ACCESS_TOKEN_ERROR};
