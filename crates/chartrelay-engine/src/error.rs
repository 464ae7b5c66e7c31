//! Engine error types

use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template '{name}' failed: {message}")]
    Template { name: String, message: String },

    #[error("Template '{name}' rendered empty output")]
    EmptyOutput { name: String },

    #[error("IO error reading template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn template(name: &str, err: &minijinja::Error) -> Self {
        // Alternate formatting includes the source location and line context
        Self::Template {
            name: name.to_string(),
            message: format!("{:#}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
