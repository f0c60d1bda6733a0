//! Error types for stackctl

use thiserror::Error;

/// Result type for stackctl operations
pub type Result<T> = std::result::Result<T, StackError>;

/// stackctl error types
#[derive(Error, Debug)]
pub enum StackError {
    /// The remote route does not exist, or Portainer has no endpoint to
    /// deploy to. The deployment target is misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any non-success status other than 404.
    #[error("Unknown error ({status}) while accessing Portainer app in {url}: {body}")]
    Execution {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StackError {
    /// Whether the error was raised below HTTP semantics (connect, DNS, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, StackError::Timeout(_) | StackError::Transport(_))
    }

    /// Whether the error is a request timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, StackError::Timeout(_))
    }
}
