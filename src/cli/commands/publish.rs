//! `publish`: barrier over the staging directory, then one release.

use super::{Scratch, composer, executor, load_config, packager, report_outcome, resolve_workspace};
use crate::cli::RuntimeConfig;
use crate::cli::args::{BuildArgs, EventArgs, PublishArgs, StagingArgs};
use crate::error::Result;
use crate::pipeline::{Pipeline, RunOutcome};
use std::path::Path;

pub(super) async fn execute(
    runtime: &RuntimeConfig,
    event: &EventArgs,
    staging_dir: &Path,
    publish: &PublishArgs,
) -> Result<i32> {
    let config = load_config(runtime)?;
    let event = event.to_event()?;
    let gate = config.gate()?;
    if !gate.admit(&event)?.should_build() {
        return report_outcome(
            runtime,
            &RunOutcome::Skipped {
                reference: event.reference,
            },
        );
    }

    let repo_dir = resolve_workspace(runtime, &config, None)?;
    let composer = composer(&config, publish, &repo_dir)?;

    // Publishing builds nothing; the executor is never invoked
    let build = BuildArgs {
        staging: StagingArgs {
            staging_dir: staging_dir.to_path_buf(),
        },
        workspace: None,
        scratch_dir: None,
        max_parallel: None,
    };
    let scratch = Scratch::prepare(None).await?;
    let pipeline = Pipeline::new(
        config.catalog()?,
        gate,
        executor(&config, repo_dir, &scratch, &build),
        packager(&config, staging_dir, &scratch)?,
        composer,
        &config.binary,
    );

    runtime.progress(&format!(
        "Publishing {} from {}",
        event.short_name(),
        staging_dir.display()
    ))?;
    let outcome = pipeline.publish_staged(&event).await;
    scratch.cleanup().await;
    report_outcome(runtime, &outcome?)
}
