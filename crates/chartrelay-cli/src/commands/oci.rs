//! OCI command - mirror packages of changed charts to the registry

use chartrelay_core::ChartRef;

use super::{ChangeArgs, Context};
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, changes: &ChangeArgs) -> Result<usize> {
    let pipeline = ctx.pipeline(ctx.load_config()?)?;
    let files = ctx.changed_files(Some(&pipeline), changes).await?;

    let detected = pipeline.detect_changes(&files);
    let charts: Vec<ChartRef> = detected.modified().cloned().collect();

    let summary = pipeline.publish_to_registry(&charts).await?;
    display::print_registry(&summary);
    Ok(summary.failed())
}
