//! Idempotent release creation
//!
//! A release is looked up by tag before anything is generated. An existing
//! release is never touched again: re-running the pipeline is always safe.

use chartrelay_core::{Chart, ChartRef, Package, PipelineConfig, TagTemplate};
use chartrelay_engine::{NotesContext, NotesEngine};
use chartrelay_repo::{IssueTracker, NewRelease, Release, ReleaseApi};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Stage, StageContext, StageError};

/// What publishing one chart did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { tag: String, release_id: u64 },
    /// Release already exists
    Skipped { tag: String },
    /// Release exists with an asset that differs from the local package
    Drifted { tag: String },
}

/// Creates one release per chart version
pub struct ReleasePublisher {
    releases: Arc<dyn ReleaseApi>,
    issues: Arc<dyn IssueTracker>,
    engine: Arc<NotesEngine>,
    config: Arc<PipelineConfig>,
    tags: TagTemplate,
}

impl ReleasePublisher {
    pub fn new(
        releases: Arc<dyn ReleaseApi>,
        issues: Arc<dyn IssueTracker>,
        engine: Arc<NotesEngine>,
        config: Arc<PipelineConfig>,
    ) -> chartrelay_core::Result<Self> {
        let tags = config.tag_template()?;
        Ok(Self {
            releases,
            issues,
            engine,
            config,
            tags,
        })
    }

    pub fn tags(&self) -> &TagTemplate {
        &self.tags
    }

    /// Publish a packaged chart
    ///
    /// Steps run strictly in order: existence check, notes, creation, upload.
    pub async fn publish(
        &self,
        chart: &Chart,
        package: &Package,
    ) -> Result<PublishOutcome, StageError> {
        let name = chart.name.as_str();
        let tag = self.tags.render(name, &chart.version);

        let existing = self
            .releases
            .get_release_by_tag(&tag)
            .await
            .stage(name, Stage::ExistenceCheck)?;
        if let Some(existing) = existing {
            return self.check_existing(&existing, package, tag);
        }

        let issues = self.issues.closed_issues(chart).await;
        let context = NotesContext::new(chart, &tag, issues, &self.config);
        let body = self
            .engine
            .render_notes(&context)
            .stage(name, Stage::Notes)?;

        let request =
            NewRelease::new(tag.clone(), body).with_target(&self.config.repository.branch);
        let release = self
            .releases
            .create_release(&request)
            .await
            .stage(name, Stage::CreateRelease)?;

        if let Err(e) = self.upload(&release, package).await {
            self.roll_back(&release).await;
            return Err(e);
        }

        info!(chart = %name, version = %chart.version, %tag, kind = %chart.kind, "release published");
        Ok(PublishOutcome::Published {
            tag,
            release_id: release.id,
        })
    }

    async fn upload(&self, release: &Release, package: &Package) -> Result<(), StageError> {
        let name = package.name.as_str();
        let data = package.read().stage(name, Stage::UploadAsset)?;
        self.releases
            .upload_asset(
                release,
                &package.source_file_name,
                package.kind.as_str(),
                data,
            )
            .await
            .stage(name, Stage::UploadAsset)?;
        Ok(())
    }

    /// Remove a release left without its asset, so a re-run can retry it
    async fn roll_back(&self, release: &Release) {
        if let Err(e) = self.releases.delete_release(release).await {
            warn!(tag = %release.tag_name, error = %e, "cannot remove incomplete release");
            return;
        }
        if let Err(e) = self.releases.delete_tag(&release.tag_name).await {
            warn!(tag = %release.tag_name, error = %e, "cannot remove tag of incomplete release");
        }
    }

    fn check_existing(
        &self,
        existing: &Release,
        package: &Package,
        tag: String,
    ) -> Result<PublishOutcome, StageError> {
        info!(chart = %package.name, %tag, "release already exists, skipping");

        if !self.config.release.verify_existing {
            return Ok(PublishOutcome::Skipped { tag });
        }

        let Some(remote) = existing.chart_asset().and_then(|a| a.sha256()) else {
            warn!(chart = %package.name, %tag, "existing release reports no asset digest");
            return Ok(PublishOutcome::Skipped { tag });
        };

        let local = package
            .digest()
            .stage(&package.name, Stage::ExistenceCheck)?;
        if local != remote {
            warn!(
                chart = %package.name,
                %tag,
                local = %local,
                remote = %remote,
                "existing release differs from the local package"
            );
            return Ok(PublishOutcome::Drifted { tag });
        }

        Ok(PublishOutcome::Skipped { tag })
    }

    /// Delete every release of a chart and its tag; returns the number removed
    pub async fn delete_chart(
        &self,
        chart: &ChartRef,
        history: &[Release],
    ) -> Result<usize, StageError> {
        let mut removed = 0;

        for release in history
            .iter()
            .filter(|r| self.tags.matches(&chart.name, &r.tag_name))
        {
            self.releases
                .delete_release(release)
                .await
                .stage(&chart.name, Stage::Delete)?;
            self.releases
                .delete_tag(&release.tag_name)
                .await
                .stage(&chart.name, Stage::Delete)?;
            info!(chart = %chart.name, tag = %release.tag_name, "release deleted");
            removed += 1;
        }

        Ok(removed)
    }
}
