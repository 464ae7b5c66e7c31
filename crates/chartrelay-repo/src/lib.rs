//! chartrelay remote collaborators
//!
//! This crate talks to everything outside the working tree:
//!
//! - **Releases**: create, query and delete GitHub releases and their assets
//! - **Signed commits**: the `createCommitOnBranch` GraphQL mutation
//! - **OCI registries**: mirror packaged charts as Helm OCI artifacts
//! - **Repository index**: the Helm-compatible `index.yaml` model
//!
//! Every collaborator sits behind a trait (`ReleaseApi`, `CommitApi`,
//! `OciPublisher`, `IssueTracker`) with an in-memory double in [`mock`].
//!
//! ## Security Notes
//!
//! - Tokens are read from environment variables named in configuration
//! - Credentials are redacted from `Debug` output

pub mod credentials;
pub mod error;
pub mod github;
pub mod graphql;
pub mod index;
pub mod issues;
pub mod mock;
pub mod oci;
pub mod releases;

// Re-exports for convenience
pub use credentials::{Credentials, ResolvedCredentials};
pub use error::{RepoError, Result};
pub use github::GitHubClient;
pub use graphql::{
    CommitApi, CommitInfo, CommitMessage, CommittableBranch, CreateCommitOnBranchInput,
    FileAddition, FileChanges, FileDeletion,
};
pub use index::{ChartEntry, RepositoryIndex};
pub use issues::{IssueTracker, NoIssues};
pub use oci::{OciPublisher, OciRegistry, PushOutcome, RegistryPublisher};
pub use releases::{NewRelease, Release, ReleaseApi, ReleaseAsset};
