//! Credential resolution
//!
//! Tokens are never stored in configuration, only the names of the
//! environment variables holding them (CI/CD friendly).

use chartrelay_core::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// Credential sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Basic authentication (username/password)
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Username and password read from environment variables
    Env {
        username_var: String,
        password_var: String,
    },

    /// Bearer token read from an environment variable
    TokenEnv { var: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    pub fn token_env(var: impl Into<String>) -> Self {
        Credentials::TokenEnv { var: var.into() }
    }

    /// GitHub API token source from configuration
    pub fn github(config: &PipelineConfig) -> Self {
        Self::token_env(&config.github.token_env)
    }

    /// Registry login source from configuration
    pub fn registry(config: &PipelineConfig) -> Self {
        Self::from_env(&config.oci.username_env, &config.oci.password_env)
    }

    /// Resolve credentials to actual values
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        match self {
            Credentials::Basic { username, password } => Ok(ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::Bearer { token } => Ok(ResolvedCredentials::Bearer {
                token: token.clone(),
            }),
            Credentials::Env {
                username_var,
                password_var,
            } => Ok(ResolvedCredentials::Basic {
                username: read_var(username_var)?,
                password: read_var(password_var)?,
            }),
            Credentials::TokenEnv { var } => Ok(ResolvedCredentials::Bearer {
                token: read_var(var)?,
            }),
        }
    }
}

fn read_var(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(RepoError::CredentialNotFound {
            var: var.to_string(),
        }),
    }
}

/// Resolved credentials ready for use
#[derive(Clone)]
pub enum ResolvedCredentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl ResolvedCredentials {
    /// Authorization header value
    pub fn auth_header(&self) -> String {
        match self {
            ResolvedCredentials::Basic { username, password } => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password),
                );
                format!("Basic {}", encoded)
            }
            ResolvedCredentials::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ResolvedCredentials::Bearer { .. } => {
                f.debug_struct("Bearer").field("token", &"***").finish()
            }
        }
    }
}
