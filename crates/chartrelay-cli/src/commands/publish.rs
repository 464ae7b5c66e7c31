//! Publish command - package changed charts and create their releases

use chartrelay_core::ChartRef;

use super::{ChangeArgs, Context};
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, changes: &ChangeArgs) -> Result<usize> {
    let pipeline = ctx.pipeline(ctx.load_config()?)?;
    let files = ctx.changed_files(Some(&pipeline), changes).await?;

    let detected = pipeline.detect_changes(&files);
    let charts: Vec<ChartRef> = detected.modified().cloned().collect();

    let summary = pipeline.package_and_publish(&charts).await?;
    display::print_publish(&summary);
    Ok(summary.failed())
}
