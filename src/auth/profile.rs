use serde::{Deserialize, Serialize};

/// Claims returned by the user-info endpoint.
///
/// The standard claims are lifted into fields; anything else the provider
/// sends (roles, custom attributes, ...) is kept in `claims`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Best human-readable label for this user.
    pub fn display_name(&self) -> Option<&str> {
        self.preferred_username
            .as_deref()
            .or(self.name.as_deref())
            .or(self.email.as_deref())
            .or(self.sub.as_deref())
    }

    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }
}
