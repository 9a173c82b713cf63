//! Error types for Nomad client operations

use thiserror::Error;

/// Result type alias for Nomad client operations
pub type Result<T> = std::result::Result<T, NomadClientError>;

/// Errors that can occur during Nomad client operations
#[derive(Error, Debug)]
pub enum NomadClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Topic filter rejected at subscribe time
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Event stream accumulated more unparsed bytes than allowed
    #[error("Stream buffer overflow: {len} bytes buffered (limit {limit})")]
    BufferOverflow { len: usize, limit: usize },
}

impl NomadClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Whether the failure is expected to clear up on its own
    ///
    /// Subscriptions retry every error; this only feeds logging and callers
    /// that want to distinguish misuse from outages.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::ServerError { status, .. } => *status >= 500 || *status == 429,
            Self::BufferOverflow { .. } | Self::ParseError(_) => true,
            Self::InvalidUrl(_) | Self::InvalidTopic(_) | Self::ConfigError(_) => false,
        }
    }
}

impl From<serde_json::Error> for NomadClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}
