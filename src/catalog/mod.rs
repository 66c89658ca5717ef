//! Target catalog: the fixed set of platforms a release is built for.
//!
//! The catalog is declarative data validated once at startup. An inconsistent
//! entry (for example a macOS triple declared on a Linux host without cross
//! compilation) is a [`ConfigError`], never a runtime failure.
//!
//! The catalog also renders itself as a CI job matrix so an external scheduler
//! can run each target in its own isolated host environment.

mod host;
mod target;

pub use host::HostKind;
pub use target::Target;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validated, ordered list of build targets.
#[derive(Clone, Debug)]
pub struct TargetCatalog {
    targets: Vec<Target>,
}

impl TargetCatalog {
    /// Builds a catalog, rejecting empty, duplicate or inconsistent entries.
    pub fn new(targets: Vec<Target>) -> Result<Self, ConfigError> {
        if targets.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for target in &targets {
            target.validate()?;
            if !seen.insert(target.triple.as_str()) {
                return Err(ConfigError::InvalidTarget {
                    triple: target.triple.clone(),
                    reason: "listed more than once".into(),
                });
            }
        }

        Ok(Self { targets })
    }

    /// Targets in declaration order
    pub fn list_targets(&self) -> &[Target] {
        &self.targets
    }

    /// Looks up a target by triple
    pub fn get(&self, triple: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.triple == triple)
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a validated catalog
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Renders the catalog as a CI job matrix.
    pub fn matrix(&self, runners: &RunnerLabels) -> BuildMatrix {
        BuildMatrix {
            include: self
                .targets
                .iter()
                .map(|t| MatrixEntry {
                    target: t.triple.clone(),
                    os: runners.label(t.host).to_string(),
                    host: t.host,
                    cross: t.cross,
                })
                .collect(),
        }
    }
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self {
            targets: default_targets(),
        }
    }
}

/// Built-in targets used when `release.toml` declares none.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::native("x86_64-unknown-linux-gnu", HostKind::Linux),
        Target::native("x86_64-unknown-linux-musl", HostKind::Linux),
        Target::cross("aarch64-unknown-linux-gnu"),
        Target::cross("x86_64-unknown-freebsd"),
        Target::native("x86_64-apple-darwin", HostKind::MacOs),
        Target::native("aarch64-apple-darwin", HostKind::MacOs),
        Target::native("x86_64-pc-windows-msvc", HostKind::Windows),
    ]
}

/// CI runner label per host kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerLabels {
    /// Runner for Linux hosts
    pub linux: String,
    /// Runner for macOS hosts
    pub macos: String,
    /// Runner for Windows hosts
    pub windows: String,
}

impl Default for RunnerLabels {
    fn default() -> Self {
        Self {
            linux: "ubuntu-latest".into(),
            macos: "macos-latest".into(),
            windows: "windows-latest".into(),
        }
    }
}

impl RunnerLabels {
    /// Label for a host kind
    pub fn label(&self, host: HostKind) -> &str {
        match host {
            HostKind::Linux => &self.linux,
            HostKind::MacOs => &self.macos,
            HostKind::Windows => &self.windows,
        }
    }
}

/// Job matrix in the `{"include": [...]}` shape CI schedulers consume.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildMatrix {
    /// One entry per target
    pub include: Vec<MatrixEntry>,
}

/// One matrix job.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatrixEntry {
    /// Target triple
    pub target: String,
    /// Runner label
    pub os: String,
    /// Host kind
    pub host: HostKind,
    /// Whether the job cross-compiles
    pub cross: bool,
}
