//! `run`: every stage in one process.

use super::{Scratch, composer, executor, load_config, packager, report_outcome, resolve_workspace};
use crate::catalog::HostKind;
use crate::cli::RuntimeConfig;
use crate::cli::args::{BuildArgs, EventArgs, PublishArgs};
use crate::error::Result;
use crate::pipeline::{Pipeline, RunOutcome};

pub(super) async fn execute(
    runtime: &RuntimeConfig,
    event: &EventArgs,
    build: &BuildArgs,
    publish: &PublishArgs,
) -> Result<i32> {
    let config = load_config(runtime)?;
    let event = event.to_event()?;
    let gate = config.gate()?;
    let decision = gate.admit(&event)?;
    if !decision.should_build() {
        return report_outcome(
            runtime,
            &RunOutcome::Skipped {
                reference: event.reference,
            },
        );
    }

    let workspace = resolve_workspace(runtime, &config, build.workspace.as_deref())?;
    // Missing credentials fail the run before anything is built
    let composer = composer(&config, publish, &workspace)?;
    let scratch = Scratch::prepare(build.scratch_dir.as_deref()).await?;
    let pipeline = Pipeline::new(
        config.catalog()?,
        gate,
        executor(&config, workspace, &scratch, build),
        packager(&config, &build.staging.staging_dir, &scratch)?,
        composer,
        &config.binary,
    );

    let foreign: Vec<&str> = pipeline
        .catalog()
        .list_targets()
        .iter()
        .filter(|t| Some(t.host_environment()) != HostKind::current())
        .map(|t| t.triple.as_str())
        .collect();
    if !foreign.is_empty() {
        runtime.warn(&format!(
            "{} need another host and will fail here; use matrix/build/publish for multi-host releases",
            foreign.join(", ")
        ))?;
    }

    runtime.progress(&format!(
        "{} {} across {} target(s)",
        decision,
        event.short_name(),
        pipeline.catalog().len()
    ))?;
    let outcome = pipeline.run(&event).await;
    scratch.cleanup().await;
    report_outcome(runtime, &outcome?)
}
