//! Release records and the release hosting API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A published release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// The packaged chart attached to this release
    pub fn chart_asset(&self) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(".tgz"))
    }

    /// Timestamp used for index entries
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.created_at)
    }
}

/// A binary attached to a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    /// API URL of the asset
    pub url: String,
    /// Public download URL
    pub browser_download_url: String,
    /// `sha256:<hex>` when the host reports it
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    /// Hex sha256 without the algorithm prefix
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .map(|d| d.strip_prefix("sha256:").unwrap_or(d))
    }
}

/// Request body to create a release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commitish: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
}

impl NewRelease {
    pub fn new(tag: impl Into<String>, body: impl Into<String>) -> Self {
        let tag_name = tag.into();
        Self {
            name: tag_name.clone(),
            tag_name,
            body: body.into(),
            target_commitish: None,
            draft: false,
            prerelease: false,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_commitish = Some(target.into());
        self
    }
}

/// Release hosting API
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Release with this tag, `None` when absent
    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>>;

    /// Full release history
    async fn list_releases(&self) -> Result<Vec<Release>>;

    async fn create_release(&self, release: &NewRelease) -> Result<Release>;

    /// Upload a binary asset; `label` carries the chart kind
    async fn upload_asset(
        &self,
        release: &Release,
        file_name: &str,
        label: &str,
        data: Vec<u8>,
    ) -> Result<ReleaseAsset>;

    async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>>;

    async fn delete_release(&self, release: &Release) -> Result<()>;

    async fn delete_tag(&self, tag: &str) -> Result<()>;

    /// Delete a container package (registry mirror) by name
    async fn delete_package(&self, package: &str) -> Result<()>;
}
