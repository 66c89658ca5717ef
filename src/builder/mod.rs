//! Build matrix: one binary per catalog target.
//!
//! This module provides the [`MatrixExecutor`] that coordinates per-target
//! builds across heterogeneous hosts.
//!
//! # Overview
//!
//! For every target the executor:
//! 1. Selects the host environment the target declares
//! 2. Runs the pre-build hooks registered for that host (once per host)
//! 3. Invokes `cross` or `cargo` with an isolated target directory
//! 4. Reports a [`BuildResult`]
//!
//! Cells run concurrently through [`fan_out`], which joins every cell before
//! returning; nothing downstream ever sees partial results.
//!
//! # Module Organization
//!
//! - [`executor`] - [`MatrixExecutor`] and the fan-out/fan-in primitive
//! - [`hooks`] - Pre-build hooks keyed by host kind (macOS SDK normalization)
//! - [`toolchain`] - The [`Toolchain`] trait and the cargo/cross binding
//! - `tool_detection` - Async, once-per-process probe for `cross`

pub mod executor;
pub mod hooks;
pub mod toolchain;
mod tool_detection;

pub use executor::{MatrixExecutor, fan_out};
pub use hooks::{HookRegistry, MacosSdkHook, PreBuildHook};
pub use toolchain::{BuildEnv, BuildRequest, CargoToolchain, Toolchain};

use crate::catalog::Target;
use crate::error::ToolchainError;
use std::path::PathBuf;

/// Outcome of one matrix cell's build
#[derive(Debug)]
pub enum BuildStatus {
    /// Binary produced
    Success {
        /// Path to the binary
        binary: PathBuf,
    },
    /// Build failed with a diagnostic
    Failure(ToolchainError),
}

/// Exactly one per enumerated target per invocation
#[derive(Debug)]
pub struct BuildResult {
    /// Target that was built
    pub target: Target,
    /// Success with the binary path, or the failure
    pub status: BuildStatus,
}

impl BuildResult {
    /// Whether the build produced a binary
    pub fn is_success(&self) -> bool {
        matches!(self.status, BuildStatus::Success { .. })
    }

    /// Passes a successful result through; a failed one yields its error
    pub fn into_success(self) -> Result<Self, ToolchainError> {
        match self.status {
            BuildStatus::Failure(error) => Err(error),
            status => Ok(Self {
                target: self.target,
                status,
            }),
        }
    }
}
