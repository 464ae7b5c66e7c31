//! Run command - the full release flow

use super::{ChangeArgs, Context};
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, changes: &ChangeArgs) -> Result<usize> {
    let pipeline = ctx.pipeline(ctx.load_config()?)?;
    let files = ctx.changed_files(Some(&pipeline), changes).await?;

    let report = pipeline.run(&files).await?;
    display::print_report(&report);
    Ok(report.failed())
}
