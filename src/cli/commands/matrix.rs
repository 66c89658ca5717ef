//! `matrix`: the target catalog as a CI job matrix.

use super::{load_config, write_github_output};
use crate::cli::RuntimeConfig;
use crate::error::Result;
use std::path::Path;

pub(super) fn execute(runtime: &RuntimeConfig, github_output: Option<&Path>) -> Result<i32> {
    let config = load_config(runtime)?;
    let catalog = config.catalog()?;
    let matrix = catalog.matrix(&config.runners);

    if let Some(path) = github_output {
        // Step outputs are single-line values
        write_github_output(path, &[("matrix", serde_json::to_string(&matrix)?)])?;
    }

    runtime.progress(&format!("{} target(s) in the build matrix", catalog.len()))?;
    runtime.output().data(&serde_json::to_string_pretty(&matrix)?)?;
    Ok(0)
}
