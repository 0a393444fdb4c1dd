use thiserror::Error;

/// Errors produced while talking to the identity provider or managing sessions.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credential exchange failed: {0}")]
    CredentialExchangeFailed(String),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Identity provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("Identity provider rejected the request (status {status}): {}", .error.as_deref().unwrap_or("unknown"))]
    ProviderRejected {
        status: u16,
        error: Option<String>,
        description: Option<String>,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// HTTP status of a provider rejection, if this error is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProviderRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::InvalidResponse(error.to_string());
        }
        Self::ProviderUnreachable(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}
