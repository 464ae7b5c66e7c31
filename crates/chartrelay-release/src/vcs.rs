//! Version control access through the `git` CLI

use async_trait::async_trait;
use chartrelay_core::ChangedFile;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ReleaseError, Result};

/// Diff, status and staging primitives of the source repository
///
/// The working tree has a single writer: callers serialize `stage` and
/// `staged_changes` against each other.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Files changed between two revisions
    async fn changed_files(&self, base: &str, head: &str) -> Result<Vec<ChangedFile>>;

    /// Commit id of `HEAD`
    async fn head_oid(&self) -> Result<String>;

    /// Stage paths, including deletions
    async fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Staged changes under `paths`; anything else in the index is left out
    async fn staged_changes(&self, paths: &[PathBuf]) -> Result<Vec<ChangedFile>>;
}

/// `git` command runner rooted at a working tree
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: "git".to_string(),
            workdir: workdir.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        run_command(&self.program, args, &self.workdir).await
    }
}

/// Run a command and return its stdout, failing on a non-zero exit
pub(crate) async fn run_command(program: &str, args: &[&str], workdir: &Path) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(%command, "running");

    let output = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ReleaseError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ReleaseError::CommandFailed {
            command,
            status: output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[async_trait]
impl VersionControl for GitCli {
    async fn changed_files(&self, base: &str, head: &str) -> Result<Vec<ChangedFile>> {
        let output = self.run(&["diff", "--name-status", base, head]).await?;
        Ok(ChangedFile::parse_name_status(&output))
    }

    async fn head_oid(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["add", "--all", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await?;
        Ok(())
    }

    async fn staged_changes(&self, paths: &[PathBuf]) -> Result<Vec<ChangedFile>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["diff", "--cached", "--name-status", "--"];
        args.extend(paths.iter().map(String::as_str));
        let output = self.run(&args).await?;
        Ok(ChangedFile::parse_name_status(&output))
    }
}
