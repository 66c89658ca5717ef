//! Error types for release orchestration.
//!
//! Each pipeline stage has its own error enum; [`ReleaseError`] aggregates them
//! and decides how a run terminates (exit code and operator hint).

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Inconsistent catalog, trigger table or `release.toml`
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The gate chose to build a reference that cannot name a release
    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// A single target failed to build
    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    /// Archive creation or staging failed
    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    /// Tag annotation could not be retrieved
    #[error("Tag fetch error: {0}")]
    TagFetch(#[from] TagFetchError),

    /// The hosting service already has a release for this tag
    #[error("Release already exists for tag {tag}")]
    PublishConflict {
        /// Tag that is already released
        tag: String,
    },

    /// Any other release-hosting failure
    #[error("Publish error: {0}")]
    Publish(PublishError),

    /// One or more matrix cells failed; nothing was published
    #[error("{0}")]
    MatrixFailed(FailureReport),

    /// Composing was requested for a run the trigger gate skipped
    #[error("Nothing to release: the trigger gate skipped {reference}")]
    NothingToRelease {
        /// Reference that was skipped
        reference: String,
    },

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<PublishError> for ReleaseError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Conflict { tag } => ReleaseError::PublishConflict { tag },
            other => ReleaseError::Publish(other),
        }
    }
}

impl ReleaseError {
    /// Process exit code for this error.
    ///
    /// A publish conflict gets its own code so operators can tell
    /// "already released" apart from "release failed".
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseError::PublishConflict { .. } => 3,
            _ => 1,
        }
    }

    /// Short operator hint printed after the error, when one applies
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ReleaseError::Configuration(_) => Some("Fix release.toml and re-run; nothing was built"),
            ReleaseError::PublishConflict { .. } => {
                Some("Delete the existing release or push a new tag")
            }
            ReleaseError::TagFetch(_) => {
                Some("Real releases need an annotated tag: git tag -a <tag> -m <notes>")
            }
            ReleaseError::MatrixFailed(_) => Some("No release was published"),
            ReleaseError::Trigger(_) => {
                Some("Release names become part of asset file names; use a tag without `/`")
            }
            ReleaseError::Publish(PublishError::MissingToken) => {
                Some("Set GITHUB_TOKEN or pass --token")
            }
            _ => None,
        }
    }
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },
}

/// Configuration errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    /// release.toml could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// release.toml could not be parsed
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// Catalog entry that cannot be built as declared
    #[error("Invalid target {triple}: {reason}")]
    InvalidTarget {
        /// Target triple
        triple: String,
        /// What is inconsistent
        reason: String,
    },

    /// Catalog without targets
    #[error("Target catalog is empty")]
    EmptyCatalog,

    /// Trigger rule that cannot be compiled
    #[error("Invalid trigger rule `{pattern}`: {reason}")]
    InvalidRule {
        /// Rule pattern
        pattern: String,
        /// What is wrong
        reason: String,
    },

    /// Any other invalid value
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Config key
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Event the gate accepted but that cannot be released as named
#[derive(Error, Debug)]
pub enum TriggerError {
    /// The short reference cannot be embedded in an asset file name
    #[error("Cannot release {reference}: {reason}")]
    InvalidReleaseName {
        /// Full reference
        reference: String,
        /// What is wrong with the name
        reason: &'static str,
    },
}

/// Build failure for one target
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// The cell needs a host this executor cannot provide
    #[error("{triple} requires a {required} host, but this executor runs on {available}")]
    HostUnavailable {
        /// Target triple
        triple: String,
        /// Host kind the target needs
        required: String,
        /// Host kind of this executor
        available: String,
    },

    /// Cross-compilation wrapper missing from PATH
    #[error("`cross` is not installed; required for {triple}")]
    CrossUnavailable {
        /// Target triple
        triple: String,
    },

    /// Pre-build hook failed
    #[error("Pre-build hook for {host} failed: {reason}")]
    Hook {
        /// Host kind
        host: String,
        /// Failure description
        reason: String,
    },

    /// Toolchain process could not be started
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Toolchain exited unsuccessfully
    #[error("`{command}` exited with {status}\n{diagnostic}")]
    Failed {
        /// Command line
        command: String,
        /// Exit status description
        status: String,
        /// Captured stderr tail
        diagnostic: String,
    },

    /// Toolchain exceeded the cell timeout
    #[error("Build of {triple} timed out after {secs}s")]
    TimedOut {
        /// Target triple
        triple: String,
        /// Timeout in seconds
        secs: u64,
    },

    /// Toolchain succeeded but the binary is not where expected
    #[error("Expected binary not found at {}", path.display())]
    MissingBinary {
        /// Expected binary path
        path: PathBuf,
    },

    /// The build task panicked or was aborted
    #[error("Build task for {triple} did not complete: {reason}")]
    TaskAborted {
        /// Target triple
        triple: String,
        /// Join error description
        reason: String,
    },
}

/// Archive creation or staging failure for one target
#[derive(Error, Debug)]
pub enum PackagingError {
    /// The cell's build failed, so there is nothing to package
    #[error("{triple} was not built: {cause}")]
    NotBuilt {
        /// Target triple
        triple: String,
        /// Build failure
        cause: String,
    },

    /// Filesystem failure while archiving
    #[error("{action} {}: {source}", path.display())]
    Io {
        /// What was being done
        action: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Zip writer failure
    #[error("Failed to write zip archive {name}: {source}")]
    Zip {
        /// Asset name
        name: String,
        /// Underlying zip error
        source: zip::result::ZipError,
    },

    /// Finished archive does not hold exactly the binary at its root
    #[error("Unexpected layout in {}: {reason}", path.display())]
    Layout {
        /// Archive path
        path: PathBuf,
        /// What was found
        reason: String,
    },

    /// Staging store rejected the artifact
    #[error("Failed to stage {name}: {reason}")]
    Staging {
        /// Asset name
        name: String,
        /// Failure description
        reason: String,
    },

    /// Binary path without a usable file name
    #[error("Binary path has no file name: {}", path.display())]
    InvalidBinary {
        /// Offending path
        path: PathBuf,
    },

    /// Blocking archive task panicked
    #[error("Archive task for {name} panicked: {reason}")]
    TaskPanicked {
        /// Asset name
        name: String,
        /// Join error description
        reason: String,
    },
}

/// Failure to obtain the annotation of the triggering tag
#[derive(Error, Debug)]
pub enum TagFetchError {
    /// git could not be started
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// git exited unsuccessfully
    #[error("`{command}` failed: {stderr}")]
    Git {
        /// Command line
        command: String,
        /// Captured stderr
        stderr: String,
    },

    /// No tag with this name
    #[error("Tag {tag} does not exist")]
    NotFound {
        /// Tag name
        tag: String,
    },

    /// Lightweight tag: there is no annotation to publish
    #[error("Tag {tag} is not an annotated tag")]
    NotAnnotated {
        /// Tag name
        tag: String,
    },
}

/// Release-hosting failures
#[derive(Error, Debug)]
pub enum PublishError {
    /// The tag already has a release
    #[error("Release already exists for tag {tag}")]
    Conflict {
        /// Tag name
        tag: String,
    },

    /// No bearer token available
    #[error("No API token provided")]
    MissingToken,

    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with an error status
    #[error("API returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the response body
        message: String,
    },

    /// Bad API base URL
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An artifact could not be read back from staging
    #[error("Failed to read asset {name}: {reason}")]
    Asset {
        /// Asset name
        name: String,
        /// Failure description
        reason: String,
    },
}

/// One failed matrix cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    /// Target triple of the failed cell
    pub target: String,
    /// Rendered cause
    pub cause: String,
}

/// Summary of every failed cell of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    /// Failed cells in catalog order
    pub failures: Vec<CellFailure>,
    /// Number of cells that ran
    pub total: usize,
}

impl FailureReport {
    /// Triples of the failed targets
    pub fn failed_targets(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.target.as_str()).collect()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} target(s) failed:",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  ✗ {}: {}", failure.target, failure.cause)?;
        }
        Ok(())
    }
}
