//! Asset naming and archive format selection.

use crate::catalog::Target;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Archive container for one target's binary
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    /// `.zip`, for Windows hosts
    Zip,
    /// `.tar.gz`, for every other host
    TarGz,
}

impl ArchiveFormat {
    /// Format for a target, chosen by its host environment
    pub fn for_target(target: &Target) -> Self {
        if target.host_environment().is_windows() {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }

    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::TarGz => ".tar.gz",
        }
    }

    /// MIME type sent when uploading the asset
    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::TarGz => "application/gzip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        })
    }
}

/// Asset name for a target: `<binary>-<tag>-<triple><ext>`.
///
/// The triple makes names unique across targets of one release.
///
/// ```
/// use release_matrix::catalog::{HostKind, Target};
/// use release_matrix::packager::asset_name;
///
/// let target = Target::native("x86_64-pc-windows-msvc", HostKind::Windows);
/// assert_eq!(
///     asset_name("webhook-server", "v2.3.0", &target),
///     "webhook-server-v2.3.0-x86_64-pc-windows-msvc.zip"
/// );
/// ```
pub fn asset_name(binary: &str, tag: &str, target: &Target) -> String {
    format!(
        "{}-{}-{}{}",
        binary,
        tag,
        target.triple,
        ArchiveFormat::for_target(target).extension()
    )
}
