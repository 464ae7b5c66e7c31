//! In-memory packaging tool and version control for testing

use async_trait::async_trait;
use chartrelay_core::{Chart, ChangedFile, FileStatus, Package};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tar::{Builder, Header};

use crate::error::{ReleaseError, Result};
use crate::packager::PackagingTool;
use crate::vcs::VersionControl;

/// Counts of packaging calls
#[derive(Debug, Default, Clone)]
pub struct PackagingCounts {
    pub dependency_updates: usize,
    pub packages: usize,
}

#[derive(Default)]
struct PackagingState {
    failing_dependencies: HashSet<String>,
    failing_packages: HashSet<String>,
    counts: PackagingCounts,
}

/// Packages charts into minimal archives holding only the manifest
///
/// Archives are byte-for-byte reproducible for the same manifest.
#[derive(Clone, Default)]
pub struct MockPackagingTool {
    state: Arc<RwLock<PackagingState>>,
}

impl MockPackagingTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make packaging of this chart fail
    pub fn fail_package(&self, chart: &str) {
        self.state
            .write()
            .unwrap()
            .failing_packages
            .insert(chart.to_string());
    }

    /// Make dependency resolution of this chart fail
    pub fn fail_dependencies(&self, chart: &str) {
        self.state
            .write()
            .unwrap()
            .failing_dependencies
            .insert(chart.to_string());
    }

    pub fn counts(&self) -> PackagingCounts {
        self.state.read().unwrap().counts.clone()
    }
}

/// Reproducible `.tgz` with `<name>/Chart.yaml`
pub fn chart_archive(chart: &Chart) -> Result<Vec<u8>> {
    let manifest = serde_yaml::to_string(&chart.metadata)
        .map_err(chartrelay_core::CoreError::from)?;
    let path = format!("{}/Chart.yaml", chart.name);

    let mut header = Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.append_data(&mut header, path, manifest.as_bytes())?;
    Ok(builder.into_inner()?.finish()?)
}

#[async_trait]
impl PackagingTool for MockPackagingTool {
    async fn update_dependencies(&self, chart: &Chart) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.counts.dependency_updates += 1;
        if state.failing_dependencies.contains(&chart.name) {
            return Err(ReleaseError::CommandFailed {
                command: format!("helm dependency update {}", chart.directory.display()),
                status: "1".to_string(),
                stderr: "no repository definition".to_string(),
            });
        }
        Ok(())
    }

    async fn package(&self, chart: &Chart, destination: &Path) -> Result<Package> {
        {
            let mut state = self.state.write().unwrap();
            state.counts.packages += 1;
            if state.failing_packages.contains(&chart.name) {
                return Err(ReleaseError::CommandFailed {
                    command: format!("helm package {}", chart.directory.display()),
                    status: "1".to_string(),
                    stderr: "chart is invalid".to_string(),
                });
            }
        }

        std::fs::create_dir_all(destination)?;
        let path = destination.join(chart.package_file_name());
        std::fs::write(&path, chart_archive(chart)?)?;
        Ok(Package::from_path(&path, chart.kind)?)
    }
}

#[derive(Default)]
struct VcsState {
    changed: Vec<ChangedFile>,
    staged: Vec<PathBuf>,
    /// Paths already committed; staging them again is a no-op
    committed: HashSet<PathBuf>,
    stage_calls: usize,
}

/// Version control double; staged files are reported as modified
#[derive(Clone, Default)]
pub struct MockVcs {
    state: Arc<RwLock<VcsState>>,
    head: String,
}

impl MockVcs {
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            state: Arc::default(),
            head: head.into(),
        }
    }

    /// Files returned by `changed_files`
    pub fn with_changes(self, changed: Vec<ChangedFile>) -> Self {
        self.state.write().unwrap().changed = changed;
        self
    }

    /// Pretend the staged files were committed
    pub fn commit_staged(&self) {
        let mut state = self.state.write().unwrap();
        let staged = std::mem::take(&mut state.staged);
        state.committed.extend(staged);
    }

    /// Stage a path outside of the pipeline, as a user editing the tree would
    pub fn stage_externally(&self, path: impl Into<PathBuf>) {
        self.state.write().unwrap().staged.push(path.into());
    }

    pub fn stage_calls(&self) -> usize {
        self.state.read().unwrap().stage_calls
    }
}

#[async_trait]
impl VersionControl for MockVcs {
    async fn changed_files(&self, _base: &str, _head: &str) -> Result<Vec<ChangedFile>> {
        Ok(self.state.read().unwrap().changed.clone())
    }

    async fn head_oid(&self) -> Result<String> {
        Ok(self.head.clone())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.stage_calls += 1;
        for path in paths {
            if !state.committed.contains(path) && !state.staged.contains(path) {
                state.staged.push(path.clone());
            }
        }
        Ok(())
    }

    async fn staged_changes(&self, paths: &[PathBuf]) -> Result<Vec<ChangedFile>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .staged
            .iter()
            .filter(|p| paths.contains(p))
            .map(|p| ChangedFile::new(p.display().to_string(), FileStatus::Modified))
            .collect())
    }
}
