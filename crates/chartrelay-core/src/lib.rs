//! chartrelay core - shared types for the chart release pipeline
//!
//! This crate provides the foundational types used throughout chartrelay:
//! - `Chart`: a chart directory with its parsed `Chart.yaml`
//! - `Package`: the packaged `.tgz` produced from a chart
//! - `PipelineConfig`: the run configuration, loaded once
//! - `ChangeDetector`: maps changed paths to affected charts
//! - `ArtifactStore`: filesystem access for charts and generated files

pub mod archive;
pub mod chart;
pub mod config;
pub mod detect;
pub mod error;
pub mod issue;
pub mod package;
pub mod store;
pub mod tag;

pub use archive::{read_chart_manifest, read_file_from_archive};
pub use chart::{Chart, ChartDependency, ChartKind, ChartManifest, ChartRef, Maintainer};
pub use config::PipelineConfig;
pub use detect::{ChangeDetector, ChangedFile, DetectedCharts, FileStatus};
pub use error::{CoreError, Result};
pub use issue::IssueRef;
pub use package::Package;
pub use store::{ArtifactStore, FsStore};
pub use tag::TagTemplate;
