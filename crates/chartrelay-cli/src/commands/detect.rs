//! Detect command - list charts affected by a diff

use chartrelay_core::{ChangeDetector, FsStore};

use super::{ChangeArgs, Context};
use crate::display;
use crate::error::{CliError, Result};

pub async fn run(ctx: &Context, changes: &ChangeArgs, json: bool) -> Result<usize> {
    let config = ctx.load_config()?;
    let files = ctx.changed_files(None, changes).await?;

    let store = FsStore::new(&ctx.root);
    let detected = ChangeDetector::new(&store, &config).detect(&files);

    if json {
        let output = serde_json::to_string_pretty(&detected)
            .map_err(|e| CliError::Pipeline {
                message: e.to_string(),
            })?;
        println!("{}", output);
    } else {
        display::print_detected(&detected);
    }

    Ok(0)
}
