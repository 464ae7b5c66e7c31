//! Per-phase outcome summaries

use chartrelay_core::{DetectedCharts, Package};
use chartrelay_repo::CommitInfo;
use std::path::PathBuf;
use tracing::{error, warn};

use crate::error::{ReleaseError, Severity, Stage, StageError};

/// One failed item, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub chart: String,
    pub stage: Stage,
    pub message: String,
}

impl From<&StageError> for ItemFailure {
    fn from(e: &StageError) -> Self {
        Self {
            chart: e.chart.clone(),
            stage: e.stage,
            message: e.source.to_string(),
        }
    }
}

/// Record a failure, or stop the phase when it is fatal
pub(crate) fn absorb(
    failures: &mut Vec<ItemFailure>,
    err: StageError,
) -> Result<(), ReleaseError> {
    match err.severity {
        Severity::Isolated => {
            error!(chart = %err.chart, stage = %err.stage, error = %err.source, "item failed");
            failures.push(ItemFailure::from(&err));
            Ok(())
        }
        // Reported through the phase summary, not as an item
        Severity::Gating => {
            warn!(stage = %err.stage, error = %err.source, "phase skipped");
            Ok(())
        }
        Severity::Fatal => Err(err.into()),
    }
}

/// Outcome of `package_and_publish`
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub published: usize,
    /// Release already existed
    pub skipped: usize,
    /// Existing release whose asset differs from the local package
    pub drifted: usize,
    pub failures: Vec<ItemFailure>,
    /// Packages built in this run, for the registry phase
    pub packages: Vec<Package>,
}

impl PublishSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of `delete_charts`
#[derive(Debug, Clone, Default)]
pub struct DeleteSummary {
    /// Charts fully removed
    pub deleted: usize,
    /// Releases removed across all charts
    pub releases: usize,
    pub failures: Vec<ItemFailure>,
}

impl DeleteSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of `regenerate_index`
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    /// Charts with a written index
    pub indexed: usize,
    /// Charts without releases
    pub skipped: usize,
    /// Index entries across all charts
    pub entries: usize,
    pub failures: Vec<ItemFailure>,
    /// Generated files, relative to the repository root
    pub written: Vec<PathBuf>,
}

impl IndexSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of `publish_to_registry`
#[derive(Debug, Clone, Default)]
pub struct RegistrySummary {
    pub pushed: usize,
    /// Version already in the registry
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
    /// Registry mirroring is disabled
    pub disabled: bool,
    /// Authentication failed, nothing was attempted
    pub unauthenticated: bool,
}

impl RegistrySummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of a full run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub detected: DetectedCharts,
    pub deleted: DeleteSummary,
    pub published: PublishSummary,
    pub index: IndexSummary,
    pub registry: RegistrySummary,
    /// Signed commit of generated files, `None` when nothing changed
    pub commit: Option<CommitInfo>,
}

impl RunReport {
    /// Failed items across all phases
    pub fn failed(&self) -> usize {
        self.deleted.failed()
            + self.published.failed()
            + self.index.failed()
            + self.registry.failed()
    }
}
