//! Command line argument parsing and validation.
//!
//! Every stage command reads the triggering event the same way: explicit
//! flags first, then the GitHub Actions environment, or a full event payload.

use crate::error::{CliError, ReleaseError};
use crate::trigger::{EventKind, RefType, TriggerEvent};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Release orchestration for Rust binaries
#[derive(Parser, Debug)]
#[command(
    name = "release_matrix",
    version,
    about = "Release orchestration for Rust binaries",
    long_about = "Decides whether a push releases, builds one binary per target platform, \
packages each into a platform-appropriate archive and publishes a single release \
with every archive attached.

Stages:
  release_matrix decide                      # skip, release or draft for this event
  release_matrix matrix                      # CI job matrix from the target catalog
  release_matrix build --target <triple>     # one cell: build, package, stage
  release_matrix publish                     # barrier over staged artifacts, then publish
  release_matrix run                         # every stage in one process

Exit codes: 0 = released or skipped, 1 = failure, 3 = release already exists.",
    styles = get_styles()
)]
pub struct Args {
    /// Path to release.toml
    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "PATH",
        default_value = "release.toml",
        env = "RELEASE_MATRIX_CONFIG"
    )]
    pub config: PathBuf,

    /// Show commands, paths and per-target detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors and machine-readable results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Stage to run
    #[command(subcommand)]
    pub command: Command,
}

/// Stage commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the trigger decision for an event
    Decide {
        #[command(flatten)]
        event: EventArgs,

        /// File receiving `key=value` step outputs
        #[arg(long, value_name = "PATH", env = "GITHUB_OUTPUT")]
        github_output: Option<PathBuf>,
    },

    /// Print the target catalog as a CI job matrix
    Matrix {
        /// File receiving `key=value` step outputs
        #[arg(long, value_name = "PATH", env = "GITHUB_OUTPUT")]
        github_output: Option<PathBuf>,
    },

    /// Build, package and stage a single target
    Build {
        /// Target triple from the catalog
        #[arg(short, long, value_name = "TRIPLE")]
        target: String,

        #[command(flatten)]
        event: EventArgs,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Publish the release from staged artifacts
    Publish {
        #[command(flatten)]
        event: EventArgs,

        #[command(flatten)]
        staging: StagingArgs,

        #[command(flatten)]
        publish: PublishArgs,
    },

    /// Run every stage in this process
    Run {
        #[command(flatten)]
        event: EventArgs,

        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        publish: PublishArgs,
    },
}

/// Triggering event
#[derive(clap::Args, Debug, Clone)]
pub struct EventArgs {
    /// Event kind: push or pull_request
    #[arg(long, value_name = "KIND", env = "GITHUB_EVENT_NAME", default_value = "push")]
    pub event: String,

    /// Reference that triggered the run, e.g. refs/tags/v2.3.0
    #[arg(long = "ref", value_name = "REF", env = "GITHUB_REF")]
    pub reference: Option<String>,

    /// Namespace of a bare --ref: tag or branch
    #[arg(long, value_name = "TYPE", env = "GITHUB_REF_TYPE")]
    pub ref_type: Option<String>,

    /// GitHub event JSON payload; takes precedence over --event and --ref
    #[arg(long, value_name = "PATH")]
    pub event_payload: Option<PathBuf>,
}

impl EventArgs {
    /// Resolves the event from the payload or the flags
    pub fn to_event(&self) -> Result<TriggerEvent, ReleaseError> {
        if let Some(path) = &self.event_payload {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event payload {}", path.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Event payload {} is not valid JSON", path.display()))?;
            return Ok(TriggerEvent::from_github_payload(&payload)?);
        }

        let kind: EventKind = self.event.parse()?;
        let reference = self
            .reference
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| CliError::MissingArgument {
                argument: "--ref (or GITHUB_REF)".to_string(),
            })?;
        let ref_type = self
            .ref_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::parse::<RefType>)
            .transpose()?;
        Ok(TriggerEvent::qualified(kind, reference.trim(), ref_type))
    }
}

/// Where staged artifacts live between stages
#[derive(clap::Args, Debug, Clone)]
pub struct StagingArgs {
    /// Staging directory shared by build and publish
    #[arg(
        long,
        value_name = "DIR",
        env = "RELEASE_MATRIX_STAGING_DIR",
        default_value = "target/release-staging"
    )]
    pub staging_dir: PathBuf,
}

/// Build settings overriding release.toml
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub staging: StagingArgs,

    /// Crate workspace to build
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Parent of the per-target cargo target directories (a fresh temp dir by default)
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum matrix cells building at once
    #[arg(short = 'j', long, value_name = "N")]
    pub max_parallel: Option<usize>,
}

/// Release hosting credentials and coordinates
#[derive(clap::Args, Debug, Clone)]
pub struct PublishArgs {
    /// API token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// owner/name, when release.toml does not set it
    #[arg(long, value_name = "OWNER/NAME", env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,
}

impl PublishArgs {
    /// Splits `--repository` into owner and name
    pub fn repository_parts(&self) -> Result<Option<(String, String)>, CliError> {
        let Some(slug) = self.repository.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match slug.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Some((owner.to_string(), name.to_string())))
            }
            _ => Err(CliError::InvalidArguments {
                reason: format!("repository must be OWNER/NAME, got `{slug}`"),
            }),
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), CliError> {
        match &self.command {
            Command::Build { target, build, .. } => {
                if target.trim().is_empty() {
                    return Err(CliError::InvalidArguments {
                        reason: "--target cannot be empty".to_string(),
                    });
                }
                validate_parallel(build)
            }
            Command::Run { build, publish, .. } => {
                publish.repository_parts()?;
                validate_parallel(build)
            }
            Command::Publish { publish, .. } => publish.repository_parts().map(|_| ()),
            Command::Decide { .. } | Command::Matrix { .. } => Ok(()),
        }
    }
}

fn validate_parallel(build: &BuildArgs) -> Result<(), CliError> {
    if build.max_parallel == Some(0) {
        return Err(CliError::InvalidArguments {
            reason: "--max-parallel must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn get_styles() -> clap::builder::Styles {
    use anstyle::{AnsiColor, Color, Style};
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
    config_path: PathBuf,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            config_path: args.config.clone(),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Path of release.toml
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}
