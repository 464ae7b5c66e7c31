//! Release pipeline orchestration
//!
//! Ties change detection, packaging, publishing, index regeneration,
//! registry mirroring and signed commits together. Per-chart work runs
//! concurrently with a bounded fan-out; results are aggregated without
//! relying on completion order.

use chartrelay_core::{
    ArtifactStore, ChangeDetector, ChangedFile, Chart, ChartRef, DetectedCharts, Package,
    PipelineConfig,
};
use chartrelay_engine::NotesEngine;
use chartrelay_repo::{CommitApi, CommitInfo, IssueTracker, OciPublisher, ReleaseApi};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::commit::{SignedCommitBuilder, changes_from_staged};
use crate::error::{Result, Stage, StageContext, StageError};
use crate::index_gen::IndexGenerator;
use crate::packager::PackagingTool;
use crate::publisher::{PublishOutcome, ReleasePublisher};
use crate::registry::RegistryPhase;
use crate::summary::{
    DeleteSummary, IndexSummary, PublishSummary, RegistrySummary, RunReport, absorb,
};
use crate::vcs::VersionControl;

/// Message of commits holding generated files
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore(release): update chart index";

/// Attempts at resolving chart dependencies
const DEPENDENCY_ATTEMPTS: usize = 2;

/// External collaborators of a pipeline
pub struct Collaborators {
    pub store: Arc<dyn ArtifactStore>,
    pub vcs: Arc<dyn VersionControl>,
    pub packager: Arc<dyn PackagingTool>,
    pub releases: Arc<dyn ReleaseApi>,
    pub issues: Arc<dyn IssueTracker>,
    pub commits: Arc<dyn CommitApi>,
    /// Registry mirror, used only when `oci.enabled` is set
    pub registry: Option<Arc<dyn OciPublisher>>,
}

/// The end-to-end release flow
pub struct ReleasePipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn ArtifactStore>,
    vcs: Arc<dyn VersionControl>,
    /// The working tree has a single writer
    worktree: Mutex<()>,
    packager: Arc<dyn PackagingTool>,
    releases: Arc<dyn ReleaseApi>,
    publisher: ReleasePublisher,
    indexer: IndexGenerator,
    registry: RegistryPhase,
    committer: SignedCommitBuilder,
}

impl ReleasePipeline {
    /// Assemble a pipeline; templates are loaded relative to the store root
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Result<Self> {
        let config = Arc::new(config);
        let engine = Arc::new(
            NotesEngine::builder()
                .with_config(&config, collaborators.store.root())?
                .build()?,
        );

        let publisher = ReleasePublisher::new(
            collaborators.releases.clone(),
            collaborators.issues,
            engine.clone(),
            config.clone(),
        )?;
        let indexer = IndexGenerator::new(
            collaborators.releases.clone(),
            collaborators.store.clone(),
            engine,
            config.clone(),
        )?;
        let registry = RegistryPhase::new(
            collaborators.registry.filter(|_| config.oci.enabled),
            config.packaging.concurrency,
        );
        let committer = SignedCommitBuilder::new(
            collaborators.commits,
            config.repository.name_with_owner(),
        );

        Ok(Self {
            config,
            store: collaborators.store,
            vcs: collaborators.vcs,
            worktree: Mutex::new(()),
            packager: collaborators.packager,
            releases: collaborators.releases,
            publisher,
            indexer,
            registry,
            committer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Files changed between two revisions
    pub async fn changed_files(&self, base: &str, head: &str) -> Result<Vec<ChangedFile>> {
        let _guard = self.worktree.lock().await;
        self.vcs.changed_files(base, head).await
    }

    /// Affected charts, partitioned by kind, plus deleted charts
    pub fn detect_changes(&self, changed: &[ChangedFile]) -> DetectedCharts {
        let detected = ChangeDetector::new(self.store.as_ref(), &self.config).detect(changed);
        info!(
            application = detected.application.len(),
            library = detected.library.len(),
            deleted = detected.deleted.len(),
            "changes detected"
        );
        detected
    }

    /// Package every chart and publish a release for each new version
    pub async fn package_and_publish(&self, charts: &[ChartRef]) -> Result<PublishSummary> {
        let results: Vec<_> = stream::iter(charts)
            .map(|chart| self.package_and_publish_one(chart))
            .buffer_unordered(self.config.packaging.concurrency.max(1))
            .collect()
            .await;

        let mut summary = PublishSummary::default();
        for result in results {
            match result {
                Ok((outcome, package)) => {
                    match outcome {
                        PublishOutcome::Published { .. } => summary.published += 1,
                        PublishOutcome::Skipped { .. } => summary.skipped += 1,
                        PublishOutcome::Drifted { .. } => summary.drifted += 1,
                    }
                    summary.packages.push(package);
                }
                Err(e) => absorb(&mut summary.failures, e)?,
            }
        }
        summary
            .packages
            .sort_by(|a, b| a.source_file_name.cmp(&b.source_file_name));

        info!(
            published = summary.published,
            skipped = summary.skipped,
            drifted = summary.drifted,
            failed = summary.failed(),
            "publish finished"
        );
        Ok(summary)
    }

    /// Dependencies, packaging, then publishing, strictly in that order
    async fn package_and_publish_one(
        &self,
        chart: &ChartRef,
    ) -> std::result::Result<(PublishOutcome, Package), StageError> {
        let loaded = self.load_chart(chart)?;
        let name = loaded.name.as_str();

        self.update_dependencies(&loaded).await?;

        let destination = self
            .store
            .root()
            .join(self.config.scratch_dir_for(loaded.kind));
        let package = self
            .packager
            .package(&loaded, &destination)
            .await
            .stage(name, Stage::Package)?;

        let outcome = self.publisher.publish(&loaded, &package).await?;
        Ok((outcome, package))
    }

    fn load_chart(&self, chart: &ChartRef) -> std::result::Result<Chart, StageError> {
        Chart::load(self.store.as_ref(), chart, &self.config.charts.manifest)
            .stage(&chart.name, Stage::Manifest)
    }

    async fn update_dependencies(&self, chart: &Chart) -> std::result::Result<(), StageError> {
        let mut attempt = 1;
        loop {
            match self.packager.update_dependencies(chart).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < DEPENDENCY_ATTEMPTS => {
                    warn!(chart = %chart.name, attempt, error = %e, "dependency update failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(StageError::new(&chart.name, Stage::Dependencies, e)),
            }
        }
    }

    /// Rebuild every chart index from the full release history
    pub async fn regenerate_index(&self) -> Result<IndexSummary> {
        let charts = self.indexer.discover()?;
        let history = self
            .releases
            .list_releases()
            .await
            .stage("*", Stage::Discovery)?;
        self.indexer.regenerate(&history, &charts).await
    }

    /// Mirror the packages of the given charts to the registry
    ///
    /// Only packages already built for these charts are pushed; a no-op when
    /// the registry is disabled.
    pub async fn publish_to_registry(&self, charts: &[ChartRef]) -> Result<RegistrySummary> {
        if !self.registry.is_enabled() {
            return Ok(RegistrySummary {
                disabled: true,
                ..Default::default()
            });
        }

        let mut packages = Vec::new();
        let mut failures = Vec::new();
        for chart in charts {
            match self.built_package(chart) {
                Ok(package) => packages.push(package),
                Err(e) => absorb(&mut failures, e)?,
            }
        }

        let mut summary = self.registry.publish(&packages).await?;
        summary.failures.extend(failures);
        Ok(summary)
    }

    fn built_package(&self, chart: &ChartRef) -> std::result::Result<Package, StageError> {
        let loaded = self.load_chart(chart)?;
        let path = self
            .store
            .root()
            .join(self.config.scratch_dir_for(loaded.kind))
            .join(loaded.package_file_name());
        Package::from_path(&path, loaded.kind)
            .and_then(|p| {
                if p.file_path.exists() {
                    Ok(p)
                } else {
                    Err(chartrelay_core::CoreError::ChartNotFound {
                        path: path.display().to_string(),
                    })
                }
            })
            .stage(&loaded.name, Stage::Push)
    }

    /// Delete releases, tags and registry packages of removed charts
    pub async fn delete_charts(&self, deleted: &[ChartRef]) -> Result<DeleteSummary> {
        let mut summary = DeleteSummary::default();
        if deleted.is_empty() {
            return Ok(summary);
        }

        let history = self
            .releases
            .list_releases()
            .await
            .stage("*", Stage::Discovery)?;

        for chart in deleted {
            match self.delete_chart(chart, &history).await {
                Ok(removed) => {
                    summary.deleted += 1;
                    summary.releases += removed;
                }
                Err(e) => absorb(&mut summary.failures, e)?,
            }
        }

        info!(
            deleted = summary.deleted,
            releases = summary.releases,
            failed = summary.failed(),
            "chart deletion finished"
        );
        Ok(summary)
    }

    async fn delete_chart(
        &self,
        chart: &ChartRef,
        history: &[chartrelay_repo::Release],
    ) -> std::result::Result<usize, StageError> {
        let removed = self.publisher.delete_chart(chart, history).await?;
        if let Some(registry) = self.registry.publisher() {
            registry
                .delete(chart)
                .await
                .stage(&chart.name, Stage::Delete)?;
        }
        Ok(removed)
    }

    /// Stage generated files and persist them in one signed commit
    ///
    /// Returns `None` when the files are unchanged.
    pub async fn commit_generated(
        &self,
        branch: &str,
        files: &[PathBuf],
        message: &str,
    ) -> Result<Option<CommitInfo>> {
        let _guard = self.worktree.lock().await;

        self.vcs.stage(files).await.stage(branch, Stage::Commit)?;
        let staged = self
            .vcs
            .staged_changes(files)
            .await
            .stage(branch, Stage::Commit)?;
        let head = self.vcs.head_oid().await.stage(branch, Stage::Commit)?;

        let changes = changes_from_staged(self.store.as_ref(), &staged)?;
        self.committer.commit(branch, &head, changes, message).await
    }

    /// Full run: detect, delete, publish, index, mirror, commit
    pub async fn run(&self, changed: &[ChangedFile]) -> Result<RunReport> {
        let detected = self.detect_changes(changed);

        let deleted = self.delete_charts(&detected.deleted).await?;

        let to_publish: Vec<ChartRef> = detected.modified().cloned().collect();
        let published = self.package_and_publish(&to_publish).await?;

        let index = self.regenerate_index().await?;

        let registry = self.registry.publish(&published.packages).await?;

        let commit = if index.written.is_empty() {
            None
        } else {
            self.commit_generated(
                &self.config.repository.branch,
                &index.written,
                DEFAULT_COMMIT_MESSAGE,
            )
            .await?
        };

        let report = RunReport {
            detected,
            deleted,
            published,
            index,
            registry,
            commit,
        };
        info!(failed = report.failed(), "run finished");
        Ok(report)
    }
}
