//! Repository index regeneration
//!
//! Indexes are rebuilt from release history alone, never from local package
//! state: packages are scratch files, releases are durable.

use chartrelay_core::package::sha256_hex;
use chartrelay_core::{
    ArtifactStore, ChartKind, ChartRef, PipelineConfig, TagTemplate, read_chart_manifest,
};
use chartrelay_engine::{NotesEngine, RedirectContext};
use chartrelay_repo::{ChartEntry, Release, ReleaseApi, RepositoryIndex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ReleaseError, Result, Stage, StageContext, StageError};
use crate::summary::{IndexSummary, absorb};

pub const INDEX_FILE: &str = "index.yaml";
pub const REDIRECT_FILE: &str = "index.html";

/// Writes per-chart `index.yaml` files and redirect pages
pub struct IndexGenerator {
    releases: Arc<dyn ReleaseApi>,
    store: Arc<dyn ArtifactStore>,
    engine: Arc<NotesEngine>,
    config: Arc<PipelineConfig>,
    tags: TagTemplate,
}

impl IndexGenerator {
    pub fn new(
        releases: Arc<dyn ReleaseApi>,
        store: Arc<dyn ArtifactStore>,
        engine: Arc<NotesEngine>,
        config: Arc<PipelineConfig>,
    ) -> chartrelay_core::Result<Self> {
        let tags = config.tag_template()?;
        Ok(Self {
            releases,
            store,
            engine,
            config,
            tags,
        })
    }

    /// Every chart directory under both kind roots
    ///
    /// A missing root holds no charts. An unreadable root is fatal; an
    /// unreadable chart directory is skipped.
    pub fn discover(&self) -> Result<Vec<ChartRef>> {
        let mut charts = Vec::new();

        for kind in ChartKind::ALL {
            let root = self.config.root_for(kind);
            if !self
                .store
                .exists(Path::new(root))
                .stage(root, Stage::Discovery)?
            {
                debug!(%kind, root, "chart root does not exist");
                continue;
            }

            let dirs = self
                .store
                .list_dirs(Path::new(root))
                .stage(root, Stage::Discovery)?;

            for dir in dirs {
                let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                    continue;
                };
                let chart = ChartRef::new(kind, root, name);
                match self
                    .store
                    .exists(&chart.directory.join(&self.config.charts.manifest))
                {
                    Ok(true) => charts.push(chart),
                    Ok(false) => debug!(chart = %chart, "no manifest, not a chart"),
                    Err(e) => warn!(chart = %chart, error = %e, "cannot read chart directory"),
                }
            }
        }

        Ok(charts)
    }

    /// Rebuild the index of every chart from release history
    pub async fn regenerate(
        &self,
        history: &[Release],
        charts: &[ChartRef],
    ) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();
        let mut merged = RepositoryIndex::default();

        for chart in charts {
            match self.write_redirect(chart) {
                Ok(Some(path)) => summary.written.push(path),
                Ok(None) => {}
                Err(e) => absorb(&mut summary.failures, e)?,
            }

            match self.index_chart(history, chart).await {
                Ok(Some((index, path))) => {
                    summary.indexed += 1;
                    summary.entries += index.len();
                    summary.written.push(path);
                    merged.merge(index);
                }
                Ok(None) => {
                    debug!(chart = %chart.name, "no releases, no index");
                    summary.skipped += 1;
                }
                Err(e) => absorb(&mut summary.failures, e)?,
            }
        }

        if self.config.pages.merged_index {
            let path = self.config.pages.directory.join(INDEX_FILE);
            let yaml = merged.to_yaml().stage("*", Stage::Index);
            let written = yaml.and_then(|yaml| {
                self.store
                    .write(&path, yaml.as_bytes())
                    .stage("*", Stage::Index)
            });
            match written {
                Ok(()) => summary.written.push(path),
                Err(e) => absorb(&mut summary.failures, e)?,
            }
        }

        info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            failed = summary.failed(),
            "index regenerated"
        );
        Ok(summary)
    }

    /// Build and write the index of one chart; `None` when it has no releases
    pub async fn index_chart(
        &self,
        history: &[Release],
        chart: &ChartRef,
    ) -> std::result::Result<Option<(RepositoryIndex, PathBuf)>, StageError> {
        let releases: Vec<&Release> = history
            .iter()
            .filter(|r| self.tags.matches(&chart.name, &r.tag_name))
            .collect();
        if releases.is_empty() {
            return Ok(None);
        }

        let mut index = RepositoryIndex::default();
        for release in releases {
            match self.entry_for(release).await {
                Ok(entry) => index.add_entry(entry),
                Err(e) => {
                    warn!(chart = %chart.name, tag = %release.tag_name, error = %e, "version left out of index");
                }
            }
        }

        let path = self
            .config
            .pages_dir_for(chart.kind, &chart.name)
            .join(INDEX_FILE);
        let yaml = index.to_yaml().stage(&chart.name, Stage::Index)?;
        self.store
            .write(&path, yaml.as_bytes())
            .stage(&chart.name, Stage::Index)?;

        debug!(chart = %chart.name, versions = index.len(), path = %path.display(), "index written");
        Ok(Some((index, path)))
    }

    /// Index entry of one release, from the manifest inside its asset
    async fn entry_for(&self, release: &Release) -> Result<ChartEntry> {
        let asset = release
            .chart_asset()
            .ok_or_else(|| ReleaseError::PackageMissing {
                path: format!("release {}", release.tag_name),
            })?;

        let data = self.releases.download_asset(asset).await?;
        let manifest = read_chart_manifest(&data, &self.config.charts.manifest)?;

        Ok(ChartEntry::from_manifest(
            &manifest,
            &asset.browser_download_url,
            sha256_hex(&data),
            release.timestamp(),
        ))
    }

    /// Redirect page of a chart directory; skipped without a docs URL
    fn write_redirect(
        &self,
        chart: &ChartRef,
    ) -> std::result::Result<Option<PathBuf>, StageError> {
        if self.config.pages.docs_url.is_empty() {
            return Ok(None);
        }

        let context = RedirectContext {
            name: chart.name.clone(),
            url: self.config.docs_url_for(chart.kind, &chart.name),
        };
        let html = self
            .engine
            .render_redirect(&context)
            .stage(&chart.name, Stage::Index)?;

        let path = self
            .config
            .pages_dir_for(chart.kind, &chart.name)
            .join(REDIRECT_FILE);
        self.store
            .write(&path, html.as_bytes())
            .stage(&chart.name, Stage::Index)?;
        Ok(Some(path))
    }
}
