//! Change detection
//!
//! Maps the files touched by a diff to the chart directories they belong to.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::chart::{ChartKind, ChartRef};
use crate::config::PipelineConfig;
use crate::store::ArtifactStore;

/// Status of a path in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    /// Parse the status letter of `git diff --name-status`
    pub fn from_git_letter(letter: &str) -> Option<Self> {
        match letter.chars().next()? {
            'A' | 'C' => Some(FileStatus::Added),
            'M' | 'T' => Some(FileStatus::Modified),
            'D' => Some(FileStatus::Removed),
            'R' => Some(FileStatus::Renamed),
            _ => None,
        }
    }
}

/// One changed path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(path, FileStatus::Modified)
    }

    pub fn removed(path: impl Into<String>) -> Self {
        Self::new(path, FileStatus::Removed)
    }

    /// Parse `git diff --name-status` output
    ///
    /// A rename yields the old path as removed and the new path as added.
    pub fn parse_name_status(output: &str) -> Vec<Self> {
        let mut files = Vec::new();

        for line in output.lines() {
            let mut fields = line.split('\t');
            let Some(status) = fields.next().and_then(FileStatus::from_git_letter) else {
                continue;
            };

            match status {
                FileStatus::Renamed => {
                    if let (Some(old), Some(new)) = (fields.next(), fields.next()) {
                        files.push(Self::removed(old));
                        files.push(Self::new(new, FileStatus::Added));
                    }
                }
                _ => {
                    if let Some(path) = fields.next() {
                        files.push(Self::new(path, status));
                    }
                }
            }
        }

        files
    }
}

/// Charts affected by a diff, partitioned by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectedCharts {
    pub application: Vec<ChartRef>,
    pub library: Vec<ChartRef>,
    pub deleted: Vec<ChartRef>,
}

impl DetectedCharts {
    /// Charts to package (application + library)
    pub fn total(&self) -> usize {
        self.application.len() + self.library.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.deleted.is_empty()
    }

    /// Modified charts of both kinds, applications first
    pub fn modified(&self) -> impl Iterator<Item = &ChartRef> {
        self.application.iter().chain(self.library.iter())
    }
}

/// Detects affected charts from changed paths
pub struct ChangeDetector<'a> {
    store: &'a dyn ArtifactStore,
    roots: [(ChartKind, String); 2],
    manifest: String,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a dyn ArtifactStore, config: &PipelineConfig) -> Self {
        Self {
            store,
            roots: [
                (
                    ChartKind::Application,
                    config.root_for(ChartKind::Application).to_string(),
                ),
                (
                    ChartKind::Library,
                    config.root_for(ChartKind::Library).to_string(),
                ),
            ],
            manifest: config.charts.manifest.clone(),
        }
    }

    /// Detect from bare paths, all treated as modified
    pub fn detect_paths<S: AsRef<str>>(&self, paths: &[S]) -> DetectedCharts {
        let files: Vec<_> = paths
            .iter()
            .map(|p| ChangedFile::modified(p.as_ref()))
            .collect();
        self.detect(&files)
    }

    /// Partition changed files into modified and deleted charts
    pub fn detect(&self, files: &[ChangedFile]) -> DetectedCharts {
        let mut candidates = BTreeSet::new();
        let mut removed_manifests = BTreeSet::new();

        for file in files {
            let Some((chart, rest)) = self.locate(&file.path) else {
                continue;
            };
            if file.status == FileStatus::Removed && rest == self.manifest {
                removed_manifests.insert(chart.clone());
            }
            candidates.insert(chart);
        }

        let mut detected = DetectedCharts::default();

        for chart in candidates {
            let manifest_path = chart.directory.join(&self.manifest);
            match self.store.exists(&manifest_path) {
                Ok(true) => match chart.kind {
                    ChartKind::Application => detected.application.push(chart),
                    ChartKind::Library => detected.library.push(chart),
                },
                Ok(false) if removed_manifests.contains(&chart) => {
                    debug!(chart = %chart, "chart manifest removed");
                    detected.deleted.push(chart);
                }
                Ok(false) => {
                    debug!(chart = %chart, "directory has no manifest, not a chart");
                }
                Err(e) => {
                    warn!(chart = %chart, error = %e, "cannot read chart directory, skipping");
                }
            }
        }

        detected
    }

    /// Chart a path belongs to, plus the path inside the chart directory
    fn locate<'p>(&self, path: &'p str) -> Option<(ChartRef, &'p str)> {
        let path = path.trim_start_matches("./");

        for (kind, root) in &self.roots {
            let Some(rest) = path
                .strip_prefix(root.as_str())
                .and_then(|r| r.strip_prefix('/'))
            else {
                continue;
            };

            // Needs <chart>/<file>: a file directly under the root is not in a chart
            let (name, inside) = rest.split_once('/')?;
            if name.is_empty() || inside.is_empty() {
                return None;
            }

            let chart = ChartRef {
                kind: *kind,
                name: name.to_string(),
                directory: Path::new(root).join(name),
            };
            return Some((chart, inside));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_status() {
        let output = "M\tapplication/nginx/values.yaml\nD\tlibrary/old/Chart.yaml\nR100\tapplication/a/x.yaml\tapplication/b/x.yaml\n\n";
        let files = ChangedFile::parse_name_status(output);
        assert_eq!(
            files,
            vec![
                ChangedFile::modified("application/nginx/values.yaml"),
                ChangedFile::removed("library/old/Chart.yaml"),
                ChangedFile::removed("application/a/x.yaml"),
                ChangedFile::new("application/b/x.yaml", FileStatus::Added),
            ]
        );
    }

    #[test]
    fn test_status_letters() {
        assert_eq!(FileStatus::from_git_letter("A"), Some(FileStatus::Added));
        assert_eq!(FileStatus::from_git_letter("R087"), Some(FileStatus::Renamed));
        assert_eq!(FileStatus::from_git_letter("X"), None);
        assert_eq!(FileStatus::from_git_letter(""), None);
    }
}
