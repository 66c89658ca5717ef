//! Artifact staging.
//!
//! Packaging cells hand their archives to an [`ArtifactStore`]; the publish
//! stage reads them back once every cell has finished. In a CI workflow the
//! filesystem store points at the directory the workflow uploads and
//! downloads between jobs.

use crate::utils::fs::write_atomic;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use walkdir::WalkDir;

/// Durable storage for packaged artifacts between packaging and publishing.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `content` under `name`, replacing any previous content
    async fn stage(&self, name: &str, content: Bytes) -> io::Result<()>;

    /// Names of every staged artifact, sorted
    async fn list(&self) -> io::Result<Vec<String>>;

    /// Content of a staged artifact
    async fn retrieve(&self, name: &str) -> io::Result<Bytes>;

    /// Drops a staged artifact; removing a missing one is not an error
    async fn remove(&self, name: &str) -> io::Result<()>;
}

/// Stores artifacts as flat files in one directory.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact name `{name}`"),
            ));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn stage(&self, name: &str, content: Bytes) -> io::Result<()> {
        let path = self.path_for(name)?;
        write_atomic(&path, &content).await?;
        log::debug!("Staged {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    async fn list(&self) -> io::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
                let entry = entry.map_err(io::Error::other)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(".partial") {
                    continue;
                }
                names.push(name);
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn retrieve(&self, name: &str) -> io::Result<Bytes> {
        let path = self.path_for(name)?;
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }

    async fn remove(&self, name: &str) -> io::Result<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("Removed staged {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store, for single-process runs and tests.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<String, Bytes>>,
}

impl MemoryArtifactStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn stage(&self, name: &str, content: Bytes) -> io::Result<()> {
        self.artifacts.lock().await.insert(name.to_string(), content);
        Ok(())
    }

    async fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.artifacts.lock().await.keys().cloned().collect())
    }

    async fn retrieve(&self, name: &str) -> io::Result<Bytes> {
        self.artifacts
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{name} is not staged"))
            })
    }

    async fn remove(&self, name: &str) -> io::Result<()> {
        self.artifacts.lock().await.remove(name);
        Ok(())
    }
}
