//! Command line interface for release orchestration.
//!
//! This module provides the CLI for the release stages, with argument
//! parsing, stage execution, and user feedback.

mod args;
pub mod commands;
mod output;

pub use args::{Args, BuildArgs, Command, EventArgs, PublishArgs, RuntimeConfig, StagingArgs};
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    run_with(args).await
}

/// Executes already-parsed arguments
pub async fn run_with(args: Args) -> Result<i32> {
    args.validate()?;
    let runtime = RuntimeConfig::from(&args);
    commands::execute(args.command, &runtime).await
}
