//! Host environment kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system family of the machine that runs a build.
///
/// Every target names the host kind able to build it. The archive format of a
/// target follows its host kind: Windows hosts produce `.zip`, every other
/// host produces `.tar.gz`.
///
/// # Examples
///
/// ```
/// use release_matrix::catalog::HostKind;
///
/// assert!(HostKind::Windows.is_windows());
/// assert_eq!("macos".parse::<HostKind>().unwrap(), HostKind::MacOs);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// Linux hosts; also run the container-based `cross` wrapper
    Linux,
    /// Apple desktop hosts
    #[serde(rename = "macos")]
    MacOs,
    /// Windows hosts
    Windows,
}

impl HostKind {
    /// All host kinds, in matrix output order
    pub const ALL: [HostKind; 3] = [HostKind::Linux, HostKind::MacOs, HostKind::Windows];

    /// Host kind of the machine running this process, if supported
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(HostKind::Linux)
        } else if cfg!(target_os = "macos") {
            Some(HostKind::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(HostKind::Windows)
        } else {
            None
        }
    }

    /// Lowercase identifier used in config and matrix output
    pub fn as_str(&self) -> &'static str {
        match self {
            HostKind::Linux => "linux",
            HostKind::MacOs => "macos",
            HostKind::Windows => "windows",
        }
    }

    /// Whether archives built on this host are zip files
    pub fn is_windows(&self) -> bool {
        matches!(self, HostKind::Windows)
    }

    /// Host kind that natively builds a triple's operating system
    pub(crate) fn native_for_triple(triple: &str) -> Option<Self> {
        if triple.contains("-apple-darwin") {
            Some(HostKind::MacOs)
        } else if triple.contains("-windows") {
            Some(HostKind::Windows)
        } else if triple.contains("-linux") {
            Some(HostKind::Linux)
        } else {
            None
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(HostKind::Linux),
            "macos" | "darwin" => Ok(HostKind::MacOs),
            "windows" => Ok(HostKind::Windows),
            other => Err(format!(
                "unknown host kind `{other}` (expected linux, macos or windows)"
            )),
        }
    }
}
