//! Config command - read settings by dotted path

use serde_json::Value;

use super::Context;
use crate::error::{CliError, Result};

/// Print one setting, e.g. `oci.registry`
pub fn get(ctx: &Context, key: &str) -> Result<usize> {
    let config = ctx.load_config()?;
    let value = config.value_at(key).ok_or_else(|| {
        CliError::usage_with_help(
            format!("unknown setting '{}'", key),
            "settings use dotted camelCase paths, e.g. `release.titleTemplate`",
        )
    })?;

    println!("{}", render(&value)?);
    Ok(0)
}

/// Scalars print bare, sections print as YAML
fn render(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| CliError::Pipeline {
                message: e.to_string(),
            }),
    }
}
