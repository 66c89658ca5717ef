//! `release.toml` configuration.
//!
//! Everything except `binary` is optional. The file is parsed and validated
//! once at startup; any inconsistency is a [`ConfigError`] and nothing runs.

use crate::catalog::{RunnerLabels, Target, TargetCatalog, default_targets};
use crate::error::ConfigError;
use crate::trigger::{
    DEFAULT_TEST_BRANCH, RuleConfig, TriggerGate, default_version_prefixes,
};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Default GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Body of every draft release
pub const DEFAULT_DRAFT_MESSAGE: &str = "Test release";

/// Parsed `release.toml`
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Name of the binary to build and package
    pub binary: String,
    /// Where releases are published
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Trigger rules
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Build matrix settings
    #[serde(default)]
    pub build: BuildConfig,
    /// CI runner labels for `matrix`
    #[serde(default)]
    pub runners: RunnerLabels,
    /// Target catalog; the built-in catalog when empty
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// `[repository]` section
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository owner (falls back to `GITHUB_REPOSITORY`)
    pub owner: Option<String>,
    /// Repository name (falls back to `GITHUB_REPOSITORY`)
    pub name: Option<String>,
    /// REST API base URL
    pub api_url: String,
    /// Asset upload base URL; derived from `api_url` when unset
    pub uploads_url: Option<String>,
    /// Remote the tag object is fetched from
    pub remote: String,
    /// Fetch the tag object before reading its annotation
    pub fetch_tags: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: None,
            name: None,
            api_url: DEFAULT_API_URL.to_string(),
            uploads_url: None,
            remote: "origin".to_string(),
            fetch_tags: true,
        }
    }
}

impl RepositoryConfig {
    /// `owner/name` when both are configured
    pub fn slug(&self) -> Option<String> {
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => Some(format!("{owner}/{name}")),
            _ => None,
        }
    }
}

/// `[trigger]` section
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TriggerConfig {
    /// Branch whose pushes create draft releases; `""` disables it
    pub test_branch: String,
    /// Body of draft releases
    pub draft_message: String,
    /// Accepted major-version tag prefixes (relative to `refs/tags/`)
    pub version_prefixes: Vec<String>,
    /// Explicit predicate table; replaces the generated one when non-empty
    pub rules: Vec<RuleConfig>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            test_branch: DEFAULT_TEST_BRANCH.to_string(),
            draft_message: DEFAULT_DRAFT_MESSAGE.to_string(),
            version_prefixes: default_version_prefixes(),
            rules: Vec::new(),
        }
    }
}

/// `[build]` section
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BuildConfig {
    /// Concurrent matrix cells; CPU count when unset
    pub max_parallel: Option<NonZeroUsize>,
    /// Per-cell toolchain timeout in seconds; `0` disables it
    pub timeout_secs: u64,
    /// Extra arguments passed to `cargo build` / `cross build`
    pub cargo_args: Vec<String>,
    /// Crate workspace to build; the current directory when unset
    pub workspace: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_parallel: None,
            timeout_secs: 3600,
            cargo_args: Vec::new(),
            workspace: None,
        }
    }
}

impl Config {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Parses and validates config text; `path` is only used in errors.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Minimal config for a binary with every default applied
    pub fn for_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            repository: RepositoryConfig::default(),
            trigger: TriggerConfig::default(),
            build: BuildConfig::default(),
            runners: RunnerLabels::default(),
            targets: Vec::new(),
        }
    }

    /// Checks every section; the catalog and trigger table are compiled once
    /// here so mistakes surface before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "binary",
                reason: "must not be empty".into(),
            });
        }
        if self
            .binary
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(ConfigError::InvalidValue {
                field: "binary",
                reason: format!("`{}` is not a valid binary name", self.binary),
            });
        }
        url::Url::parse(&self.repository.api_url).map_err(|e| ConfigError::InvalidValue {
            field: "repository.api_url",
            reason: e.to_string(),
        })?;
        if let Some(uploads) = &self.repository.uploads_url {
            url::Url::parse(uploads).map_err(|e| ConfigError::InvalidValue {
                field: "repository.uploads_url",
                reason: e.to_string(),
            })?;
        }
        if self.trigger.draft_message.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "trigger.draft_message",
                reason: "must not be empty".into(),
            });
        }
        self.catalog()?;
        self.gate()?;
        Ok(())
    }

    /// Validated target catalog
    pub fn catalog(&self) -> Result<TargetCatalog, ConfigError> {
        if self.targets.is_empty() {
            TargetCatalog::new(default_targets())
        } else {
            TargetCatalog::new(self.targets.clone())
        }
    }

    /// Compiled trigger gate
    pub fn gate(&self) -> Result<TriggerGate, ConfigError> {
        if !self.trigger.rules.is_empty() {
            return TriggerGate::from_rules(&self.trigger.rules);
        }
        let test_branch = Some(self.trigger.test_branch.as_str()).filter(|b| !b.is_empty());
        Ok(TriggerGate::with_version_prefixes(
            &self.trigger.version_prefixes,
            test_branch,
        ))
    }

    /// Concurrent matrix cells
    pub fn max_parallel(&self) -> usize {
        self.build
            .max_parallel
            .map(NonZeroUsize::get)
            .unwrap_or_else(num_cpus::get)
    }

    /// Per-cell timeout, `None` when disabled
    pub fn build_timeout(&self) -> Option<std::time::Duration> {
        match self.build.timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}
