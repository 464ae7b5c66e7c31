//! Error types for the release pipeline

use chartrelay_core::CoreError;
use chartrelay_engine::EngineError;
use chartrelay_repo::RepoError;
use std::fmt;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Errors raised by pipeline collaborators
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// External command exited with a failure status
    #[error("`{command}` failed (exit {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// External command could not be started
    #[error("cannot run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Packaging reported success but produced no archive
    #[error("packaging produced no archive at {path}")]
    PackageMissing { path: String },

    #[error("commit branch must not be empty")]
    EmptyBranch,

    #[error("expected head commit must not be empty")]
    EmptyHead,

    #[error("commit message must not be empty")]
    EmptyMessage,

    #[error("registry authentication failed")]
    RegistryAuth,

    /// Phase-ending failure of one step
    #[error(transparent)]
    Stage(Box<StageError>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StageError> for ReleaseError {
    fn from(e: StageError) -> Self {
        ReleaseError::Stage(Box::new(e))
    }
}

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Only the current chart is abandoned
    Isolated,
    /// The current phase is skipped, the run continues
    Gating,
    /// The run fails
    Fatal,
}

/// Pipeline step a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Discovery,
    Manifest,
    Dependencies,
    Package,
    ExistenceCheck,
    Notes,
    CreateRelease,
    UploadAsset,
    Delete,
    Authenticate,
    Push,
    Index,
    Commit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Manifest => "manifest",
            Stage::Dependencies => "dependencies",
            Stage::Package => "package",
            Stage::ExistenceCheck => "existence-check",
            Stage::Notes => "notes",
            Stage::CreateRelease => "create-release",
            Stage::UploadAsset => "upload-asset",
            Stage::Delete => "delete",
            Stage::Authenticate => "authenticate",
            Stage::Push => "push",
            Stage::Index => "index",
            Stage::Commit => "commit",
        }
    }

    /// Severity of a failure in this step
    pub fn severity(&self) -> Severity {
        match self {
            Stage::Discovery | Stage::Commit => Severity::Fatal,
            Stage::Authenticate => Severity::Gating,
            Stage::Manifest
            | Stage::Dependencies
            | Stage::Package
            | Stage::ExistenceCheck
            | Stage::Notes
            | Stage::CreateRelease
            | Stage::UploadAsset
            | Stage::Delete
            | Stage::Push
            | Stage::Index => Severity::Isolated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure attributed to one chart and step
#[derive(Debug, Error)]
#[error("{chart}: {stage} failed: {source}")]
pub struct StageError {
    pub chart: String,
    pub stage: Stage,
    pub severity: Severity,
    #[source]
    pub source: ReleaseError,
}

impl StageError {
    /// Failure with the severity of its step
    pub fn new(chart: impl Into<String>, stage: Stage, source: impl Into<ReleaseError>) -> Self {
        Self {
            chart: chart.into(),
            stage,
            severity: stage.severity(),
            source: source.into(),
        }
    }
}

/// Attach chart identity and step to a fallible result
pub(crate) trait StageContext<T> {
    fn stage(self, chart: &str, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T, E: Into<ReleaseError>> StageContext<T> for std::result::Result<T, E> {
    fn stage(self, chart: &str, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|e| StageError::new(chart, stage, e))
    }
}
