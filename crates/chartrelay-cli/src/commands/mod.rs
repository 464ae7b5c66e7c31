//! CLI commands

pub mod commit;
pub mod config;
pub mod detect;
pub mod index;
pub mod oci;
pub mod publish;
pub mod run;

use chartrelay_core::{ChangedFile, FsStore, PipelineConfig};
use chartrelay_release::{Collaborators, GitCli, HelmCli, ReleasePipeline, VersionControl};
use chartrelay_repo::{GitHubClient, OciPublisher, RegistryPublisher};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CliError, Result};

/// Where changed files come from
#[derive(Args, Debug, Clone)]
pub struct ChangeArgs {
    /// Base revision of the diff
    #[arg(long, default_value = "HEAD~1")]
    pub base: String,

    /// Head revision of the diff
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Changed paths, used instead of a git diff
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<String>,
}

/// Repository root and configuration location shared by all commands
pub struct Context {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl Context {
    pub fn new(root: &Path, config: &Path) -> Self {
        let config_path = if config.is_absolute() {
            config.to_path_buf()
        } else {
            root.join(config)
        };
        Self {
            root: root.to_path_buf(),
            config_path,
        }
    }

    pub fn load_config(&self) -> Result<PipelineConfig> {
        PipelineConfig::load(&self.config_path).map_err(|e| {
            CliError::config_with_help(
                format!("{}: {}", self.config_path.display(), e),
                "pass --config with the path of a valid chartrelay.yaml",
            )
        })
    }

    /// Pipeline wired to git, helm, GitHub and the configured registry
    pub fn pipeline(&self, config: PipelineConfig) -> Result<ReleasePipeline> {
        let github = Arc::new(GitHubClient::from_config(&config)?);
        let registry = config.oci.enabled.then(|| {
            Arc::new(RegistryPublisher::from_config(&config, github.clone()))
                as Arc<dyn OciPublisher>
        });

        let collaborators = Collaborators {
            store: Arc::new(FsStore::new(&self.root)),
            vcs: Arc::new(GitCli::new(&self.root)),
            packager: Arc::new(HelmCli::new(&config.packaging.helm, &self.root)),
            releases: github.clone(),
            issues: github.clone(),
            commits: github,
            registry,
        };

        Ok(ReleasePipeline::new(config, collaborators)?)
    }

    /// Changed files from `--path`, or from a git diff
    pub async fn changed_files(
        &self,
        pipeline: Option<&ReleasePipeline>,
        args: &ChangeArgs,
    ) -> Result<Vec<ChangedFile>> {
        if !args.paths.is_empty() {
            return Ok(args.paths.iter().map(ChangedFile::modified).collect());
        }

        let files = match pipeline {
            Some(pipeline) => pipeline.changed_files(&args.base, &args.head).await?,
            None => {
                GitCli::new(&self.root)
                    .changed_files(&args.base, &args.head)
                    .await?
            }
        };
        Ok(files)
    }
}
