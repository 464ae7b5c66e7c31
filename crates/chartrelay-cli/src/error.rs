//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use chartrelay_core::CoreError;
use chartrelay_release::ReleaseError;
use chartrelay_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration missing, unreadable or invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartrelay::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A phase failed as a whole
    #[error("Pipeline failed: {message}")]
    #[diagnostic(code(chartrelay::cli::pipeline))]
    Pipeline { message: String },

    /// Some charts failed and `--strict` was given
    #[error("{failed} item(s) failed")]
    #[diagnostic(
        code(chartrelay::cli::items_failed),
        help("see the failures listed above, or re-run without --strict")
    )]
    ItemsFailed { failed: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartrelay::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(chartrelay::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Pipeline { .. } => exit_codes::ERROR,
            CliError::ItemsFailed { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig { message } => CliError::config(message),
            CoreError::Io(e) => e.into(),
            other => CliError::Pipeline {
                message: other.to_string(),
            },
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::CredentialNotFound { var } => CliError::config_with_help(
                format!("environment variable {} is not set", var),
                format!("export {} with a token allowed to manage releases", var),
            ),
            RepoError::InvalidUrl { url, reason } => {
                CliError::config(format!("invalid URL {}: {}", url, reason))
            }
            RepoError::Core(e) => e.into(),
            other => CliError::Pipeline {
                message: other.to_string(),
            },
        }
    }
}

impl From<ReleaseError> for CliError {
    fn from(err: ReleaseError) -> Self {
        match err {
            ReleaseError::Core(e) => e.into(),
            ReleaseError::Repo(e) => e.into(),
            ReleaseError::Io(e) => e.into(),
            other => CliError::Pipeline {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config("x").exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(CliError::usage("x").exit_code(), exit_codes::USAGE_ERROR);
        assert_eq!(
            CliError::ItemsFailed { failed: 2 }.exit_code(),
            exit_codes::ERROR
        );
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err: CliError = RepoError::CredentialNotFound {
            var: "GITHUB_TOKEN".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err: CliError = ReleaseError::Core(CoreError::InvalidConfig {
            message: "packaging.concurrency must be at least 1".to_string(),
        })
        .into();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }
}
