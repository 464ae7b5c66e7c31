//! Release pipeline for chartrelay
//!
//! Drives a multi-chart repository from a diff to published artifacts:
//!
//! - detect charts affected by the diff, including deleted ones
//! - package each chart and publish one release per new version
//! - rebuild per-chart `index.yaml` files from release history
//! - mirror new packages to an OCI registry
//! - persist generated files in a single signed commit
//!
//! Per-chart failures are isolated: one broken chart never blocks the
//! others, and every run is safe to repeat.

pub mod commit;
pub mod error;
pub mod index_gen;
pub mod mock;
pub mod packager;
pub mod pipeline;
pub mod publisher;
pub mod registry;
pub mod summary;
pub mod vcs;

pub use commit::{SignedCommitBuilder, changes_from_staged};
pub use error::{ReleaseError, Result, Severity, Stage, StageError};
pub use index_gen::{INDEX_FILE, IndexGenerator, REDIRECT_FILE};
pub use packager::{HelmCli, PackagingTool};
pub use pipeline::{Collaborators, DEFAULT_COMMIT_MESSAGE, ReleasePipeline};
pub use publisher::{PublishOutcome, ReleasePublisher};
pub use registry::RegistryPhase;
pub use summary::{
    DeleteSummary, IndexSummary, ItemFailure, PublishSummary, RegistrySummary, RunReport,
};
pub use vcs::{GitCli, VersionControl};
