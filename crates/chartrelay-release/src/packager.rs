//! Chart packaging through the `helm` CLI

use async_trait::async_trait;
use chartrelay_core::{Chart, Package};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ReleaseError, Result};
use crate::vcs::run_command;

/// External packaging tool
#[async_trait]
pub trait PackagingTool: Send + Sync {
    /// Resolve the chart's declared dependencies
    async fn update_dependencies(&self, chart: &Chart) -> Result<()>;

    /// Package the chart into `destination`
    async fn package(&self, chart: &Chart, destination: &Path) -> Result<Package>;
}

/// `helm dependency update` + `helm package`
#[derive(Debug, Clone)]
pub struct HelmCli {
    program: String,
    workdir: PathBuf,
}

impl HelmCli {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl PackagingTool for HelmCli {
    async fn update_dependencies(&self, chart: &Chart) -> Result<()> {
        if chart.metadata.dependencies.is_empty() {
            debug!(chart = %chart.name, "no dependencies to update");
            return Ok(());
        }

        let dir = chart.directory.display().to_string();
        run_command(&self.program, &["dependency", "update", &dir], &self.workdir).await?;
        Ok(())
    }

    async fn package(&self, chart: &Chart, destination: &Path) -> Result<Package> {
        let destination = self.workdir.join(destination);
        tokio::fs::create_dir_all(&destination).await?;

        let dir = chart.directory.display().to_string();
        let dest = destination.display().to_string();
        run_command(
            &self.program,
            &["package", &dir, "--destination", &dest],
            &self.workdir,
        )
        .await?;

        let path = destination.join(chart.package_file_name());
        if !tokio::fs::try_exists(&path).await? {
            return Err(ReleaseError::PackageMissing {
                path: path.display().to_string(),
            });
        }

        Ok(Package::from_path(&path, chart.kind)?)
    }
}
