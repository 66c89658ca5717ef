//! Build target definition.

use super::HostKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// One platform the binary is built for.
///
/// Targets come from configuration and are never created or mutated at
/// runtime.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Rust target triple, e.g. `x86_64-unknown-linux-gnu`
    pub triple: String,
    /// Build through the cross-compiling wrapper instead of plain cargo
    #[serde(default)]
    pub cross: bool,
    /// Host kind able to run the build
    pub host: HostKind,
}

impl Target {
    /// Native target built on `host`
    pub fn native(triple: impl Into<String>, host: HostKind) -> Self {
        Self {
            triple: triple.into(),
            cross: false,
            host,
        }
    }

    /// Cross-compiled target; the wrapper always runs on Linux hosts
    pub fn cross(triple: impl Into<String>) -> Self {
        Self {
            triple: triple.into(),
            cross: true,
            host: HostKind::Linux,
        }
    }

    /// Whether the cross-compiling toolchain variant must be used
    pub fn requires_cross_compilation(&self) -> bool {
        self.cross
    }

    /// Host kind capable of running this target's build
    pub fn host_environment(&self) -> HostKind {
        self.host
    }

    /// Whether the produced executable carries a `.exe` suffix
    pub fn produces_exe(&self) -> bool {
        self.triple.contains("-windows")
    }

    /// File name of the binary the toolchain produces for this target
    pub fn binary_file_name(&self, binary: &str) -> String {
        if self.produces_exe() {
            format!("{binary}.exe")
        } else {
            binary.to_string()
        }
    }

    /// Checks that the declared host and toolchain can actually build the triple.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTarget {
            triple: self.triple.clone(),
            reason,
        };

        let parts: Vec<&str> = self.triple.split('-').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid(
                "expected a target triple of the form <arch>-<vendor>-<os>[-<env>]".into(),
            ));
        }
        if self.triple.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(invalid("target triple contains invalid characters".into()));
        }

        if self.cross {
            if self.host != HostKind::Linux {
                return Err(invalid(format!(
                    "cross-compilation runs on linux hosts, not {}",
                    self.host
                )));
            }
            return Ok(());
        }

        match HostKind::native_for_triple(&self.triple) {
            Some(native) if native == self.host => Ok(()),
            Some(native) => Err(invalid(format!(
                "a {} host cannot build this target natively (needs {native}, or set cross = true)",
                self.host
            ))),
            None => Err(invalid(
                "no supported host builds this OS natively; set cross = true".into(),
            )),
        }
    }
}
