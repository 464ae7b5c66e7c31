//! Repository index types
//!
//! Helm-compatible `index.yaml`. Entries live in a sorted map and versions are
//! kept in descending semver order, so serializing the same set of entries
//! always yields the same bytes.

use chartrelay_core::ChartManifest;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Creation time of the newest entry
    #[serde(default)]
    pub generated: DateTime<Utc>,

    /// Chart versions indexed by chart name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: DateTime::<Utc>::default(),
            entries: BTreeMap::new(),
        }
    }
}

impl RepositoryIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut index: Self =
            serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
                message: e.to_string(),
            })?;
        for versions in index.entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(b, a));
        }
        Ok(index)
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of indexed chart versions
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// All versions of a chart, newest first
    pub fn get(&self, name: &str) -> Option<&Vec<ChartEntry>> {
        self.entries.get(name)
    }

    /// Highest semver version of a chart
    pub fn get_latest(&self, name: &str) -> Option<&ChartEntry> {
        self.entries.get(name)?.first()
    }

    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version == version)
    }

    /// Add an entry, replacing any entry with the same name and version
    pub fn add_entry(&mut self, entry: ChartEntry) {
        if let Some(created) = entry.created.filter(|c| *c > self.generated) {
            self.generated = created;
        }

        let versions = self.entries.entry(entry.name.clone()).or_default();
        versions.retain(|e| e.version != entry.version);
        versions.push(entry);
        versions.sort_by(|a, b| compare_versions(b, a));
    }

    /// Merge another index into this one
    pub fn merge(&mut self, other: RepositoryIndex) {
        for entry in other.entries.into_values().flatten() {
            self.add_entry(entry);
        }
        if other.generated > self.generated {
            self.generated = other.generated;
        }
    }
}

/// Semver ordering, unparsable versions sort below parsable ones
fn compare_versions(a: &ChartEntry, b: &ChartEntry) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

/// Chart version entry in the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    /// `application` or `library`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<IndexDependency>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    /// Download URLs of the archive
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 of the archive, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl ChartEntry {
    /// Build an entry from the manifest packaged inside an archive
    pub fn from_manifest(
        manifest: &ChartManifest,
        url: impl Into<String>,
        digest: impl Into<String>,
        created: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            api_version: manifest.api_version.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            app_version: manifest.app_version.clone(),
            description: manifest.description.clone(),
            kube_version: manifest.kube_version.clone(),
            chart_type: manifest.chart_type.clone(),
            home: manifest.home.clone(),
            icon: manifest.icon.clone(),
            sources: manifest.sources.clone(),
            keywords: manifest.keywords.clone(),
            maintainers: manifest
                .maintainers
                .iter()
                .map(|m| Maintainer {
                    name: m.name.clone(),
                    email: m.email.clone(),
                    url: m.url.clone(),
                })
                .collect(),
            dependencies: manifest
                .dependencies
                .iter()
                .map(|d| IndexDependency {
                    name: d.name.clone(),
                    version: d.version.clone(),
                    repository: d.repository.clone(),
                    condition: d.condition.clone(),
                    alias: d.alias.clone(),
                })
                .collect(),
            annotations: manifest.annotations.clone(),
            deprecated: manifest.deprecated,
            urls: vec![url.into()],
            digest: Some(digest.into()),
            created,
        }
    }

    /// Primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }
}

/// Maintainer in index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Dependency in index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}
