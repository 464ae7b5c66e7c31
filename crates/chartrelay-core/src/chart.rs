//! Chart definition and loading

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::package::PACKAGE_VERSION_SEPARATOR;
use crate::store::ArtifactStore;

/// Icon file names looked up in a chart directory
const ICON_FILES: [&str; 3] = ["icon.svg", "icon.png", "icon.jpg"];

/// Chart kind, decided by the root directory a chart lives under
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Application,
    Library,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::Application, ChartKind::Library];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Application => "application",
            ChartKind::Library => "library",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `Chart.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartManifest {
    /// Chart API version (v1 or v2)
    #[serde(default)]
    pub api_version: Option<String>,

    /// Chart name
    pub name: String,

    /// Chart version (SemVer)
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    /// Kubernetes version constraint
    #[serde(default)]
    pub kube_version: Option<String>,

    /// `application` or `library` as declared by the chart itself
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    #[serde(default)]
    pub home: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    #[serde(default)]
    pub dependencies: Vec<ChartDependency>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartManifest {
    /// Parse a manifest from YAML text
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml).map_err(|e| CoreError::InvalidManifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if manifest.name.is_empty() {
            return Err(CoreError::InvalidManifest {
                path: path.display().to_string(),
                message: "name is empty".to_string(),
            });
        }
        if manifest.version.is_empty() {
            return Err(CoreError::InvalidManifest {
                path: path.display().to_string(),
                message: "version is empty".to_string(),
            });
        }

        Ok(manifest)
    }

    /// Parse version as semver
    pub fn parsed_version(&self) -> Result<Version> {
        Ok(Version::parse(&self.version)?)
    }
}

/// Maintainer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Chart dependency as declared in `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDependency {
    pub name: String,

    /// Version constraint
    #[serde(default)]
    pub version: Option<String>,

    /// Repository URL (`https://`, `oci://` or `file://`)
    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub alias: Option<String>,
}

impl ChartDependency {
    /// True when the dependency points at a chart in the same source tree
    pub fn is_local(&self) -> bool {
        self.repository
            .as_deref()
            .map(|r| r.starts_with("file://"))
            .unwrap_or(false)
    }
}

/// Identity of a chart directory, as produced by change detection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChartRef {
    pub kind: ChartKind,

    /// Directory name under the kind root
    pub name: String,

    /// `<root>/<name>`, relative to the repository root
    pub directory: PathBuf,
}

impl ChartRef {
    pub fn new(kind: ChartKind, root: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let directory = Path::new(root).join(&name);
        Self {
            kind,
            name,
            directory,
        }
    }
}

impl fmt::Display for ChartRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory.display())
    }
}

/// A chart read from the working tree
///
/// A new version is a new `Chart` value: charts are never mutated after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub name: String,
    pub kind: ChartKind,
    pub version: String,
    pub directory: PathBuf,
    pub metadata: ChartManifest,
    /// Icon file found in the chart directory, e.g. `icon.svg`
    pub icon_file: Option<String>,
}

impl Chart {
    /// Load a chart from its directory through the store
    pub fn load(store: &dyn ArtifactStore, chart: &ChartRef, manifest_file: &str) -> Result<Self> {
        let manifest_path = chart.directory.join(manifest_file);
        if !store.exists(&manifest_path)? {
            return Err(CoreError::ChartNotFound {
                path: chart.directory.display().to_string(),
            });
        }

        let content = store.read_to_string(&manifest_path)?;
        let metadata = ChartManifest::from_yaml(&content, &manifest_path)?;

        // Release tags and index lookups use the directory name, archives the manifest name
        if metadata.name != chart.name {
            return Err(CoreError::InvalidManifest {
                path: manifest_path.display().to_string(),
                message: format!(
                    "name '{}' does not match chart directory '{}'",
                    metadata.name, chart.name
                ),
            });
        }
        // `<name>-<version>.tgz` is split at the last separator
        if metadata.version.contains(PACKAGE_VERSION_SEPARATOR) {
            return Err(CoreError::InvalidManifest {
                path: manifest_path.display().to_string(),
                message: format!(
                    "version '{}' must not contain '{}'",
                    metadata.version, PACKAGE_VERSION_SEPARATOR
                ),
            });
        }

        let mut icon_file = None;
        for icon in ICON_FILES {
            if store.exists(&chart.directory.join(icon))? {
                icon_file = Some(icon.to_string());
                break;
            }
        }

        Ok(Self {
            name: metadata.name.clone(),
            kind: chart.kind,
            version: metadata.version.clone(),
            directory: chart.directory.clone(),
            metadata,
            icon_file,
        })
    }

    pub fn has_icon(&self) -> bool {
        self.icon_file.is_some()
    }

    /// Identity of this chart for logging and deletion
    pub fn reference(&self) -> ChartRef {
        ChartRef {
            kind: self.kind,
            name: self.name.clone(),
            directory: self.directory.clone(),
        }
    }

    /// Archive file name produced by packaging this chart
    pub fn package_file_name(&self) -> String {
        crate::package::Package::file_name_for(&self.name, &self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;

    const MANIFEST: &str = r#"
apiVersion: v2
name: nginx
version: 1.2.3
appVersion: "1.25.0"
description: NGINX web server
kubeVersion: ">=1.25.0-0"
dependencies:
  - name: common
    version: 2.x.x
    repository: file://../../library/common
  - name: redis
    version: "17.0.0"
    repository: https://charts.bitnami.com/bitnami
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ChartManifest::from_yaml(MANIFEST, Path::new("Chart.yaml")).unwrap();
        assert_eq!(manifest.name, "nginx");
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.app_version.as_deref(), Some("1.25.0"));
        assert_eq!(manifest.kube_version.as_deref(), Some(">=1.25.0-0"));
        assert_eq!(manifest.dependencies.len(), 2);
        assert!(manifest.dependencies[0].is_local());
        assert!(!manifest.dependencies[1].is_local());
    }

    #[test]
    fn test_manifest_requires_version() {
        let err = ChartManifest::from_yaml("name: nginx\nversion: \"\"\n", Path::new("Chart.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("version is empty"));
    }

    #[test]
    fn test_load_chart_with_icon() {
        let dir = tempfile::tempdir().unwrap();
        let chart_dir = dir.path().join("application/nginx");
        std::fs::create_dir_all(&chart_dir).unwrap();
        std::fs::write(chart_dir.join("Chart.yaml"), MANIFEST).unwrap();
        std::fs::write(chart_dir.join("icon.svg"), "<svg/>").unwrap();

        let store = FsStore::new(dir.path());
        let chart_ref = ChartRef::new(ChartKind::Application, "application", "nginx");
        let chart = Chart::load(&store, &chart_ref, "Chart.yaml").unwrap();

        assert_eq!(chart.name, "nginx");
        assert_eq!(chart.kind, ChartKind::Application);
        assert!(chart.has_icon());
        assert_eq!(chart.icon_file.as_deref(), Some("icon.svg"));
        assert_eq!(chart.package_file_name(), "nginx-1.2.3.tgz");
    }

    fn load_from(dir_name: &str, manifest: &str) -> Result<Chart> {
        let dir = tempfile::tempdir().unwrap();
        let chart_dir = dir.path().join("application").join(dir_name);
        std::fs::create_dir_all(&chart_dir).unwrap();
        std::fs::write(chart_dir.join("Chart.yaml"), manifest).unwrap();

        let store = FsStore::new(dir.path());
        let chart_ref = ChartRef::new(ChartKind::Application, "application", dir_name);
        Chart::load(&store, &chart_ref, "Chart.yaml")
    }

    #[test]
    fn test_load_rejects_name_differing_from_directory() {
        let err = load_from("web", "apiVersion: v2\nname: nginx\nversion: 1.0.0\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest { .. }));
        assert!(err.to_string().contains("does not match chart directory 'web'"));
    }

    #[test]
    fn test_load_rejects_prerelease_version() {
        let err =
            load_from("nginx", "apiVersion: v2\nname: nginx\nversion: 1.0.0-rc.1\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest { .. }));
        assert!(err.to_string().contains("1.0.0-rc.1"));
    }

    #[test]
    fn test_load_missing_chart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let chart_ref = ChartRef::new(ChartKind::Library, "library", "ghost");
        assert!(matches!(
            Chart::load(&store, &chart_ref, "Chart.yaml"),
            Err(CoreError::ChartNotFound { .. })
        ));
    }
}
