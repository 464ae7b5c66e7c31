//! Pipeline configuration
//!
//! Loaded once from `chartrelay.yaml` and handed to every component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chart::ChartKind;
use crate::error::{CoreError, Result};
use crate::tag::TagTemplate;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "chartrelay.yaml";

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default)]
    pub charts: ChartsConfig,

    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub oci: OciConfig,

    #[serde(default)]
    pub pages: PagesConfig,

    #[serde(default)]
    pub packaging: PackagingConfig,
}

/// Chart roots and manifest name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartsConfig {
    #[serde(default = "default_application_root")]
    pub application: String,

    #[serde(default = "default_library_root")]
    pub library: String,

    #[serde(default = "default_manifest")]
    pub manifest: String,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            application: default_application_root(),
            library: default_library_root(),
            manifest: default_manifest(),
        }
    }
}

fn default_application_root() -> String {
    "application".to_string()
}

fn default_library_root() -> String {
    "library".to_string()
}

fn default_manifest() -> String {
    "Chart.yaml".to_string()
}

/// Release naming and notes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfig {
    /// Tag and title template, with `{name}` and `{version}`
    #[serde(default = "default_title_template")]
    pub title_template: String,

    /// Release notes template; the embedded one is used when unset
    #[serde(default)]
    pub notes_template: Option<PathBuf>,

    /// Compare the asset digest of already existing releases with the local package
    #[serde(default)]
    pub verify_existing: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            title_template: default_title_template(),
            notes_template: None,
            verify_existing: false,
        }
    }
}

fn default_title_template() -> String {
    "{name}-{version}".to_string()
}

/// Hosting repository identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub name: String,

    /// Base URL, e.g. `https://github.com/acme/charts`
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            url: String::new(),
            branch: default_branch(),
        }
    }
}

impl RepositoryConfig {
    /// `owner/name`
    pub fn name_with_owner(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn default_branch() -> String {
    "main".to_string()
}

/// GitHub endpoints and authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_uploads_url")]
    pub uploads_url: String,

    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            uploads_url: default_uploads_url(),
            graphql_url: default_graphql_url(),
            token_env: default_token_env(),
            timeout: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_uploads_url() -> String {
    "https://uploads.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// OCI mirroring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_registry")]
    pub registry: String,

    #[serde(default = "default_oci_username_env")]
    pub username_env: String,

    #[serde(default = "default_token_env")]
    pub password_env: String,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registry: default_registry(),
            username_env: default_oci_username_env(),
            password_env: default_token_env(),
        }
    }
}

fn default_registry() -> String {
    "ghcr.io".to_string()
}

fn default_oci_username_env() -> String {
    "GITHUB_ACTOR".to_string()
}

/// Published site (index files and redirect pages)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagesConfig {
    #[serde(default = "default_pages_dir")]
    pub directory: PathBuf,

    /// Canonical documentation base URL
    #[serde(default)]
    pub docs_url: String,

    #[serde(default)]
    pub redirect_template: Option<PathBuf>,

    /// Also write a merged `index.yaml` at the site root
    #[serde(default)]
    pub merged_index: bool,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            directory: default_pages_dir(),
            docs_url: String::new(),
            redirect_template: None,
            merged_index: false,
        }
    }
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("docs")
}

/// External packaging tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingConfig {
    #[serde(default = "default_helm")]
    pub helm: String,

    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Charts packaged and published at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            helm: default_helm(),
            scratch_dir: default_scratch_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_helm() -> String {
    "helm".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".cr-release-packages")
}

fn default_concurrency() -> usize {
    4
}

impl PipelineConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail halfway through a run
    pub fn validate(&self) -> Result<()> {
        let app = self.charts.application.trim_matches('/');
        let lib = self.charts.library.trim_matches('/');
        if app.is_empty() || lib.is_empty() {
            return Err(invalid("chart roots must not be empty"));
        }
        if app == lib {
            return Err(invalid("application and library roots must differ"));
        }
        if self.charts.manifest.is_empty() {
            return Err(invalid("charts.manifest must not be empty"));
        }
        TagTemplate::new(self.release.title_template.clone())?;
        if self.packaging.concurrency == 0 {
            return Err(invalid("packaging.concurrency must be at least 1"));
        }
        if self.oci.enabled && self.oci.registry.is_empty() {
            return Err(invalid("oci.registry is required when oci.enabled is set"));
        }
        Ok(())
    }

    /// Root directory for a chart kind
    pub fn root_for(&self, kind: ChartKind) -> &str {
        match kind {
            ChartKind::Application => self.charts.application.trim_matches('/'),
            ChartKind::Library => self.charts.library.trim_matches('/'),
        }
    }

    /// Parsed release tag template
    pub fn tag_template(&self) -> Result<TagTemplate> {
        TagTemplate::new(self.release.title_template.clone())
    }

    /// Scratch packaging directory for a chart kind
    pub fn scratch_dir_for(&self, kind: ChartKind) -> PathBuf {
        self.packaging.scratch_dir.join(kind.as_str())
    }

    /// Published directory of a chart (`<pages>/<root>/<name>`)
    pub fn pages_dir_for(&self, kind: ChartKind, name: &str) -> PathBuf {
        self.pages.directory.join(self.root_for(kind)).join(name)
    }

    /// Canonical documentation URL of a chart
    pub fn docs_url_for(&self, kind: ChartKind, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.pages.docs_url.trim_end_matches('/'),
            self.root_for(kind),
            name
        )
    }

    /// Look up a setting by dotted path, e.g. `oci.registry`
    pub fn value_at(&self, path: &str) -> Option<serde_json::Value> {
        let mut current = serde_json::to_value(self).ok()?;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            current = current.get(part)?.clone();
        }
        Some(current)
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidConfig {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml("{}").unwrap();
        assert_eq!(config.root_for(ChartKind::Application), "application");
        assert_eq!(config.root_for(ChartKind::Library), "library");
        assert_eq!(config.charts.manifest, "Chart.yaml");
        assert_eq!(config.packaging.concurrency, 4);
        assert_eq!(config.github.timeout, Duration::from_secs(30));
        assert!(!config.oci.enabled);
    }

    #[test]
    fn test_parse_full() {
        let yaml = r#"
charts:
  application: charts/application/
  library: charts/library
release:
  titleTemplate: "{name}-v{version}"
repository:
  owner: acme
  name: charts
  url: https://github.com/acme/charts
github:
  timeout: 2m
oci:
  enabled: true
pages:
  docsUrl: https://charts.acme.dev/
  mergedIndex: true
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.root_for(ChartKind::Application), "charts/application");
        assert_eq!(config.repository.name_with_owner(), "acme/charts");
        assert_eq!(config.github.timeout, Duration::from_secs(120));
        assert_eq!(config.tag_template().unwrap().render("a", "1.0.0"), "a-v1.0.0");
        assert_eq!(
            config.docs_url_for(ChartKind::Library, "common"),
            "https://charts.acme.dev/charts/library/common"
        );
        assert_eq!(
            config.pages_dir_for(ChartKind::Application, "nginx"),
            PathBuf::from("docs/charts/application/nginx")
        );
    }

    #[test]
    fn test_validation_failures() {
        assert!(PipelineConfig::from_yaml("charts:\n  application: x\n  library: x\n").is_err());
        assert!(PipelineConfig::from_yaml("release:\n  titleTemplate: \"{name}\"\n").is_err());
        assert!(PipelineConfig::from_yaml("packaging:\n  concurrency: 0\n").is_err());
        assert!(
            PipelineConfig::from_yaml("oci:\n  enabled: true\n  registry: \"\"\n").is_err()
        );
    }

    #[test]
    fn test_value_at() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.value_at("oci.registry"),
            Some(serde_json::Value::String("ghcr.io".to_string()))
        );
        assert_eq!(
            config.value_at("charts.manifest"),
            Some(serde_json::Value::String("Chart.yaml".to_string()))
        );
        assert_eq!(config.value_at("oci.missing"), None);
    }
}
