//! Release orchestration library for Rust binaries.
//!
//! This library decides whether a repository event triggers a release,
//! builds one binary per target platform, packages each into an archive and
//! publishes a single aggregated release:
//! - [`trigger`] - Event to [`trigger::ReleaseDecision`] via an ordered rule table
//! - [`catalog`] - Supported targets and their host environments
//! - [`builder`] - Parallel per-target builds behind one join barrier
//! - [`packager`] - Asset naming, archives and checksums
//! - [`storage`] - Staging of artifacts between stages
//! - [`release`] - Tag annotations, message derivation and publishing
//! - [`pipeline`] - The stages wired together for one run
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod builder;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod packager;
pub mod pipeline;
pub mod release;
pub mod storage;
pub mod trigger;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, ReleaseError, Result};
pub use pipeline::{Pipeline, RunOutcome};
