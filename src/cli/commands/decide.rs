//! `decide`: trigger decision for the current event.

use super::{load_config, write_github_output};
use crate::cli::RuntimeConfig;
use crate::cli::args::EventArgs;
use crate::error::Result;
use serde_json::json;
use std::path::Path;

pub(super) fn execute(
    runtime: &RuntimeConfig,
    event: &EventArgs,
    github_output: Option<&Path>,
) -> Result<i32> {
    let config = load_config(runtime)?;
    let gate = config.gate()?;
    let event = event.to_event()?;
    let decision = gate.admit(&event)?;

    runtime.progress(&format!("{event} → {decision}"))?;

    if let Some(path) = github_output {
        write_github_output(
            path,
            &[
                ("decision", decision.to_string()),
                ("tag", event.short_name().to_string()),
                ("build", decision.should_build().to_string()),
                ("draft", decision.is_draft().to_string()),
            ],
        )?;
        runtime.verbose_println(&format!("Wrote step outputs to {}", path.display()))?;
    }

    let summary = json!({
        "decision": decision,
        "reference": event.reference,
        "tag": event.short_name(),
        "build": decision.should_build(),
        "draft": decision.is_draft(),
    });
    runtime.output().data(&serde_json::to_string_pretty(&summary)?)?;
    Ok(0)
}
