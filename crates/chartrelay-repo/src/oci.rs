//! OCI Registry client
//!
//! Pushes packaged charts as Helm OCI artifacts. Charts are namespaced as
//! `<registry>/<owner>/<repo>/<kind>/<name>:<version>`.

use async_trait::async_trait;
use chartrelay_core::{ChartKind, ChartRef, Package, PipelineConfig, read_chart_manifest};
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Reference, RegistryOperation};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credentials::{Credentials, ResolvedCredentials};
use crate::error::{RepoError, Result};
use crate::releases::ReleaseApi;

/// Media types for Helm charts in OCI
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// OCI registry client bound to one namespace
pub struct OciRegistry {
    /// `registry/owner/repo`, without scheme
    namespace: String,
    client: Client,
    auth: RegistryAuth,
}

impl OciRegistry {
    pub fn new(namespace: impl Into<String>, credentials: Option<ResolvedCredentials>) -> Self {
        let auth = match credentials {
            Some(ResolvedCredentials::Basic { username, password }) => {
                RegistryAuth::Basic(username, password)
            }
            // Registries exchange the token through basic auth
            Some(ResolvedCredentials::Bearer { token }) => RegistryAuth::Basic(String::new(), token),
            None => RegistryAuth::Anonymous,
        };

        let client = Client::new(ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        });

        Self {
            namespace: namespace
                .into()
                .trim_start_matches("oci://")
                .trim_end_matches('/')
                .to_lowercase(),
            client,
            auth,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.auth, RegistryAuth::Anonymous)
    }

    /// Parse an OCI reference string
    ///
    /// Format: oci://registry/repo:tag or registry/repo:tag
    pub fn parse_reference(reference: &str) -> Result<Reference> {
        let clean = reference
            .trim_start_matches("oci://")
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        Reference::try_from(clean).map_err(|e| RepoError::InvalidOciReference {
            reference: format!("{}: {}", reference, e),
        })
    }

    /// `<namespace>/<path>:<tag>`; `+` is not valid in OCI tags
    pub fn reference_for(&self, path: &str, version: &str) -> Result<Reference> {
        let full_ref = format!(
            "{}/{}:{}",
            self.namespace,
            path.to_lowercase(),
            version.replace('+', "_")
        );
        Self::parse_reference(&full_ref)
    }

    /// Obtain a push token for the namespace
    pub async fn authenticate(&self, path: &str) -> Result<()> {
        let reference = self.reference_for(path, "latest")?;
        self.client
            .auth(&reference, &self.auth, RegistryOperation::Push)
            .await
            .map_err(|e| RepoError::AuthFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Check if a specific tag exists
    pub async fn exists(&self, path: &str, version: &str) -> Result<bool> {
        let reference = self.reference_for(path, version)?;

        match self
            .client
            .fetch_manifest_digest(&reference, &self.auth)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let error_str = e.to_string().to_lowercase();
                if error_str.contains("not found")
                    || error_str.contains("manifest unknown")
                    || error_str.contains("404")
                {
                    Ok(false)
                } else {
                    Err(RepoError::OciError {
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    /// Push a chart archive; `config` is the chart manifest as JSON
    pub async fn push(
        &self,
        path: &str,
        version: &str,
        archive_data: Vec<u8>,
        config: Vec<u8>,
    ) -> Result<String> {
        let reference = self.reference_for(path, version)?;

        let config = Config {
            data: config,
            media_type: media_types::HELM_CONFIG.to_string(),
            annotations: None,
        };
        let layers = vec![ImageLayer {
            data: archive_data,
            media_type: media_types::HELM_CONTENT.to_string(),
            annotations: None,
        }];

        let result = self
            .client
            .push(&reference, &layers, config, &self.auth, None)
            .await
            .map_err(|e| RepoError::OciPushFailed {
                message: e.to_string(),
            })?;

        Ok(result.manifest_url)
    }
}

/// Result of publishing one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { reference: String },
    /// The version is already in the registry
    AlreadyPresent,
}

/// Registry mirror for packaged charts
#[async_trait]
pub trait OciPublisher: Send + Sync {
    /// Gate for the whole registry phase, checked against the scopes of `packages`
    async fn authenticate(&self, packages: &[Package]) -> bool;

    async fn publish(&self, package: &Package) -> Result<PushOutcome>;

    /// Remove every version of a chart
    async fn delete(&self, chart: &ChartRef) -> Result<()>;
}

/// Publishes to the configured registry, deleting through the package API
pub struct RegistryPublisher {
    registry: OciRegistry,
    releases: Arc<dyn ReleaseApi>,
    repo_name: String,
    manifest_file: String,
}

impl RegistryPublisher {
    pub fn new(
        registry: OciRegistry,
        releases: Arc<dyn ReleaseApi>,
        repo_name: impl Into<String>,
        manifest_file: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            releases,
            repo_name: repo_name.into().to_lowercase(),
            manifest_file: manifest_file.into(),
        }
    }

    /// Registry from configuration; missing credentials leave the client anonymous
    pub fn from_config(config: &PipelineConfig, releases: Arc<dyn ReleaseApi>) -> Self {
        let credentials = match Credentials::registry(config).resolve() {
            Ok(creds) => Some(creds),
            Err(e) => {
                debug!(error = %e, "no registry credentials");
                None
            }
        };
        let namespace = format!(
            "{}/{}/{}",
            config.oci.registry, config.repository.owner, config.repository.name
        );

        Self::new(
            OciRegistry::new(namespace, credentials),
            releases,
            &config.repository.name,
            &config.charts.manifest,
        )
    }

    fn path_for(kind: impl std::fmt::Display, name: &str) -> String {
        format!("{}/{}", kind, name)
    }
}

/// Repository paths a login is checked against: one per chart kind being pushed
pub fn auth_scopes(packages: &[Package]) -> Vec<String> {
    let mut scopes: Vec<(ChartKind, String)> = Vec::new();
    for package in packages {
        if !scopes.iter().any(|(kind, _)| *kind == package.kind) {
            scopes.push((package.kind, RegistryPublisher::path_for(package.kind, &package.name)));
        }
    }
    scopes.sort();
    scopes.into_iter().map(|(_, path)| path).collect()
}

#[async_trait]
impl OciPublisher for RegistryPublisher {
    async fn authenticate(&self, packages: &[Package]) -> bool {
        if self.registry.is_anonymous() {
            warn!(registry = %self.registry.namespace(), "registry credentials are not set");
            return false;
        }
        for scope in auth_scopes(packages) {
            if let Err(e) = self.registry.authenticate(&scope).await {
                warn!(registry = %self.registry.namespace(), %scope, error = %e, "registry login failed");
                return false;
            }
        }
        true
    }

    async fn publish(&self, package: &Package) -> Result<PushOutcome> {
        let path = Self::path_for(package.kind, &package.name);

        if self.registry.exists(&path, &package.version).await? {
            debug!(chart = %package.name, version = %package.version, "already in registry");
            return Ok(PushOutcome::AlreadyPresent);
        }

        let data = package.read()?;
        let manifest = read_chart_manifest(&data, &self.manifest_file)?;
        let config = serde_json::to_vec(&manifest)?;

        let reference = self
            .registry
            .push(&path, &package.version, data, config)
            .await?;
        info!(chart = %package.name, version = %package.version, %reference, "pushed to registry");
        Ok(PushOutcome::Pushed { reference })
    }

    async fn delete(&self, chart: &ChartRef) -> Result<()> {
        let package = format!(
            "{}/{}",
            self.repo_name,
            Self::path_for(chart.kind, &chart.name.to_lowercase())
        );
        self.releases.delete_package(&package).await
    }
}
