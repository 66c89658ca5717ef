//! Packaging of built binaries into release assets.
//!
//! Each successful [`BuildResult`] becomes one [`Artifact`]: a single-entry
//! archive named by [`asset_name`], checksummed and staged into an
//! [`ArtifactStore`].

pub mod archive;
pub mod checksum;
pub mod naming;

pub use archive::{ArchiveEntry, Archiver, NativeArchiver, read_entries, verify_layout};
pub use checksum::sha256_hex;
pub use naming::{ArchiveFormat, asset_name};

use crate::builder::{BuildResult, BuildStatus};
use crate::catalog::Target;
use crate::error::PackagingError;
use crate::storage::ArtifactStore;
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A packaged release asset.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Asset name, unique within a release
    pub name: String,
    /// Archive container
    pub format: ArchiveFormat,
    /// Archive bytes
    pub content: Bytes,
    /// Hex SHA-256 of `content`
    pub sha256: String,
    /// Triple of the target the archive was built for
    pub target: String,
}

impl Artifact {
    /// Rebuilds an artifact read back from staging.
    pub fn from_staged(name: impl Into<String>, content: Bytes, target: &Target) -> Self {
        let sha256 = sha256_hex(&content);
        Self {
            name: name.into(),
            format: ArchiveFormat::for_target(target),
            content,
            sha256,
            target: target.triple.clone(),
        }
    }

    /// Archive size in bytes
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("size", &self.content.len())
            .field("sha256", &self.sha256)
            .field("target", &self.target)
            .finish()
    }
}

/// Turns build results into staged artifacts.
#[derive(Clone)]
pub struct Packager {
    archiver: Arc<dyn Archiver>,
    store: Arc<dyn ArtifactStore>,
    binary: String,
    work_dir: PathBuf,
}

impl Packager {
    /// Packager writing intermediate archives under `work_dir`
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        binary: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archiver: Arc::new(NativeArchiver),
            store,
            binary: binary.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Replaces the archiver
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Store artifacts are staged into
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Removes any staged asset `target` has for `tag`.
    ///
    /// Called before a cell builds, so a failed cell never leaves an older
    /// archive under its name.
    pub async fn discard(&self, target: &Target, tag: &str) -> Result<(), PackagingError> {
        let name = asset_name(&self.binary, tag, target);
        self.store
            .remove(&name)
            .await
            .map_err(|e| PackagingError::Staging {
                name,
                reason: e.to_string(),
            })
    }

    /// Packages one successful build for release `tag`.
    pub async fn package(
        &self,
        result: &BuildResult,
        tag: &str,
    ) -> Result<Artifact, PackagingError> {
        let binary = match &result.status {
            BuildStatus::Success { binary } => binary,
            BuildStatus::Failure(cause) => {
                return Err(PackagingError::NotBuilt {
                    triple: result.target.triple.clone(),
                    cause: cause.to_string(),
                });
            }
        };
        self.package_binary(&result.target, binary, tag).await
    }

    /// Packages an already-built binary for `target`.
    async fn package_binary(
        &self,
        target: &Target,
        binary: &Path,
        tag: &str,
    ) -> Result<Artifact, PackagingError> {
        let format = ArchiveFormat::for_target(target);
        let name = asset_name(&self.binary, tag, target);
        let entry_name = target.binary_file_name(&self.binary);
        if binary.file_name().is_none() {
            return Err(PackagingError::InvalidBinary {
                path: binary.to_path_buf(),
            });
        }

        let dest = self.work_dir.join(&name);
        self.archiver
            .archive(binary, &entry_name, format, &dest)
            .await?;

        let check_path = dest.clone();
        let check_entry = entry_name.clone();
        tokio::task::spawn_blocking(move || verify_layout(&check_path, format, &check_entry))
            .await
            .map_err(|e| PackagingError::TaskPanicked {
                name: name.clone(),
                reason: e.to_string(),
            })??;

        let content = Bytes::from(tokio::fs::read(&dest).await.map_err(|source| {
            PackagingError::Io {
                action: "Failed to read",
                path: dest.clone(),
                source,
            }
        })?);
        let sha256 = sha256_hex(&content);

        self.store
            .stage(&name, content.clone())
            .await
            .map_err(|e| PackagingError::Staging {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        log::info!(
            "Packaged {} ({} bytes, sha256 {})",
            name,
            content.len(),
            sha256
        );

        Ok(Artifact {
            name,
            format,
            content,
            sha256,
            target: target.triple.clone(),
        })
    }
}

impl fmt::Debug for Packager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packager")
            .field("binary", &self.binary)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}
