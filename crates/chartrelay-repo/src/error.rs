//! Error types for remote operations

use thiserror::Error;

/// Remote operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Authentication Errors ============
    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Credential not found: environment variable {var} is not set")]
    CredentialNotFound { var: String },

    // ============ API Errors ============
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Unexpected API response: {message}")]
    InvalidResponse { message: String },

    #[error("GraphQL mutation failed: {message}")]
    GraphQl { message: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    // ============ OCI Errors ============
    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("OCI push failed: {message}")]
    OciPushFailed { message: String },

    // ============ Local Errors ============
    #[error(transparent)]
    Core(#[from] chartrelay_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

impl RepoError {
    /// True for 404-style failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::NotFound { .. } | RepoError::HttpError { status: 404, .. }
        )
    }
}
