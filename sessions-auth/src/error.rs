//! Error types for token acquisition

/// Result type for token operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Token acquisition errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No configured credential could produce a token
    #[error("Failed to retrieve the client auth token with messages: {}", .messages.join(" "))]
    CredentialUnavailable {
        /// Diagnostic message from each provider that was tried
        messages: Vec<String>,
    },

    /// The identity provider rejected the request
    #[error("Authentication rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the identity provider
        status: u16,
        /// Provider error description
        message: String,
    },

    /// The identity provider could not be reached
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The identity provider answered with something that is not a token
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Credential configuration is missing or malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AuthError {
    /// Diagnostic messages carried by this error, one per failed provider
    pub fn messages(&self) -> Vec<String> {
        match self {
            AuthError::CredentialUnavailable { messages } => messages.clone(),
            other => vec![other.to_string()],
        }
    }

    /// Check if error is transient (the caller may retry)
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::HttpError(_) => true,
            AuthError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::InvalidResponse(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::InvalidResponse(err.to_string())
        } else {
            AuthError::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::ConfigError(format!("Invalid URL: {}", err))
    }
}
