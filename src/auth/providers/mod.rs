//! Identity provider seam and its implementations.

pub mod keycloak;

use async_trait::async_trait;
use strum::{Display, EnumString, IntoStaticStr};

use super::error::AuthError;
use super::profile::UserProfile;
use super::token::TokenSet;

pub use keycloak::KeycloakProvider;

/// OAuth2 grant types sent to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum GrantType {
    Password,
    RefreshToken,
    AuthorizationCode,
}

/// Token, user-info and logout endpoints of an OpenID Connect provider.
///
/// Every call is a single request; implementations never retry.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resource-owner password grant.
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenSet, AuthError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;

    /// Authorization-code grant with a PKCE verifier.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, AuthError>;

    /// Profile claims for the owner of `access_token`.
    async fn userinfo(&self, access_token: &str) -> Result<UserProfile, AuthError>;

    /// End the provider-side session bound to `refresh_token`.
    async fn end_session(&self, refresh_token: &str) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_types_use_wire_names() {
        assert_eq!(GrantType::Password.to_string(), "password");
        assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
        let name: &'static str = GrantType::AuthorizationCode.into();
        assert_eq!(name, "authorization_code");
        assert_eq!(
            "refresh_token".parse::<GrantType>().unwrap(),
            GrantType::RefreshToken
        );
    }
}
