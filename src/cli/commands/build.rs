//! `build`: one matrix cell on the current host.

use super::{Scratch, executor, load_config, packager, resolve_workspace};
use crate::cli::RuntimeConfig;
use crate::cli::args::{BuildArgs, EventArgs};
use crate::error::{CliError, Result};
use crate::pipeline::{AssetReport, build_and_package};

pub(super) async fn execute(
    runtime: &RuntimeConfig,
    triple: &str,
    event: &EventArgs,
    build: &BuildArgs,
) -> Result<i32> {
    let config = load_config(runtime)?;
    let catalog = config.catalog()?;
    let event = event.to_event()?;
    let decision = config.gate()?.admit(&event)?;
    if !decision.should_build() {
        runtime.progress(&format!("Skipped {}: no release triggered", event.reference))?;
        return Ok(0);
    }

    let target = catalog
        .get(triple)
        .ok_or_else(|| CliError::InvalidArguments {
            reason: format!(
                "{triple} is not in the target catalog (known: {})",
                catalog
                    .list_targets()
                    .iter()
                    .map(|t| t.triple.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?
        .clone();

    let workspace = resolve_workspace(runtime, &config, build.workspace.as_deref())?;
    let scratch = Scratch::prepare(build.scratch_dir.as_deref()).await?;
    let executor = executor(&config, workspace, &scratch, build);
    let packager = packager(&config, &build.staging.staging_dir, &scratch)?;

    runtime.progress(&format!(
        "Building {} for {}",
        target.triple,
        event.short_name()
    ))?;
    let result = build_and_package(&executor, &packager, &target, event.short_name()).await;
    scratch.cleanup().await;
    let artifact = result?;

    runtime.success(&format!(
        "Staged {} in {}",
        artifact.name,
        build.staging.staging_dir.display()
    ))?;
    runtime
        .output()
        .data(&serde_json::to_string_pretty(&AssetReport::from(&artifact))?)?;
    Ok(0)
}
