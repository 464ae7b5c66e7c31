//! Commit command - persist generated files in one signed commit

use chartrelay_release::DEFAULT_COMMIT_MESSAGE;
use std::path::PathBuf;

use super::Context;
use crate::display;
use crate::error::{CliError, Result};

pub async fn run(
    ctx: &Context,
    files: &[PathBuf],
    branch: Option<&str>,
    message: Option<&str>,
) -> Result<usize> {
    if files.is_empty() {
        return Err(CliError::usage_with_help(
            "no files to commit",
            "pass the generated files, e.g. `chartrelay commit docs/application/nginx/index.yaml`",
        ));
    }

    let pipeline = ctx.pipeline(ctx.load_config()?)?;
    let branch = branch
        .map(str::to_string)
        .unwrap_or_else(|| pipeline.config().repository.branch.clone());
    let message = message.unwrap_or(DEFAULT_COMMIT_MESSAGE);

    let commit = pipeline.commit_generated(&branch, files, message).await?;
    display::print_commit(commit.as_ref());
    Ok(0)
}
