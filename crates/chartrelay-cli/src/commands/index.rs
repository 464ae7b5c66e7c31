//! Index command - rebuild chart indexes from release history

use super::Context;
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, commit: bool) -> Result<usize> {
    let pipeline = ctx.pipeline(ctx.load_config()?)?;
    let summary = pipeline.regenerate_index().await?;
    display::print_index(&summary);

    if commit && !summary.written.is_empty() {
        let branch = pipeline.config().repository.branch.clone();
        let info = pipeline
            .commit_generated(
                &branch,
                &summary.written,
                chartrelay_release::DEFAULT_COMMIT_MESSAGE,
            )
            .await?;
        display::print_commit(info.as_ref());
    }

    Ok(summary.failed())
}
