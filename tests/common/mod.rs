//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use release_matrix::builder::{BuildRequest, HookRegistry, MatrixExecutor, Toolchain};
use release_matrix::catalog::{HostKind, TargetCatalog};
use release_matrix::error::{PublishError, TagFetchError, ToolchainError};
use release_matrix::packager::Packager;
use release_matrix::pipeline::Pipeline;
use release_matrix::release::{
    PublishedRelease, ReleaseComposer, ReleaseHost, ReleaseRequest, TagSource,
};
use release_matrix::storage::{ArtifactStore, MemoryArtifactStore};
use release_matrix::trigger::TriggerGate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const BINARY: &str = "webhook-server";

/// Writes a small fake binary where cargo would put it.
#[derive(Default)]
pub struct FakeToolchain {
    pub failing: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn failing(triple: &str, diagnostic: &str) -> Self {
        let mut failing = HashMap::new();
        failing.insert(triple.to_string(), diagnostic.to_string());
        Self {
            failing,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn build(&self, request: &BuildRequest) -> Result<PathBuf, ToolchainError> {
        self.calls
            .lock()
            .unwrap()
            .push(request.target.triple.clone());
        if let Some(diagnostic) = self.failing.get(&request.target.triple) {
            return Err(ToolchainError::Failed {
                command: format!("cross build --target {}", request.target.triple),
                status: "exit status: 101".into(),
                diagnostic: diagnostic.clone(),
            });
        }
        let binary = request.expected_binary();
        tokio::fs::create_dir_all(binary.parent().unwrap()).await.unwrap();
        tokio::fs::write(&binary, format!("binary for {}", request.target.triple))
            .await
            .unwrap();
        Ok(binary)
    }
}

/// Annotated tags keyed by name.
#[derive(Default)]
pub struct FakeTags {
    pub annotations: HashMap<String, String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeTags {
    pub fn with(tag: &str, annotation: &str) -> Self {
        let mut annotations = HashMap::new();
        annotations.insert(tag.to_string(), annotation.to_string());
        Self {
            annotations,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TagSource for FakeTags {
    async fn fetch_tag(&self, tag: &str) -> Result<(), TagFetchError> {
        self.fetched.lock().unwrap().push(tag.to_string());
        Ok(())
    }

    async fn annotation(&self, tag: &str) -> Result<String, TagFetchError> {
        self.annotations
            .get(tag)
            .cloned()
            .ok_or_else(|| TagFetchError::NotAnnotated {
                tag: tag.to_string(),
            })
    }
}

/// Records every publish call.
#[derive(Default)]
pub struct RecordingHost {
    pub requests: Mutex<Vec<ReleaseRequest>>,
    pub existing_tags: Vec<String>,
}

impl RecordingHost {
    pub fn publish_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ReleaseHost for RecordingHost {
    async fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError> {
        if !request.draft && self.existing_tags.contains(&request.tag) {
            return Err(PublishError::Conflict {
                tag: request.tag.clone(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(PublishedRelease {
            id: requests.len() as u64,
            url: format!("https://github.com/acme/webhook/releases/tag/{}", request.tag),
            draft: request.draft,
            assets: request.assets.iter().map(|a| a.name.clone()).collect(),
        })
    }
}

/// A pipeline over the default catalog where every host kind is available.
pub struct Harness {
    pub pipeline: Pipeline,
    pub toolchain: Arc<FakeToolchain>,
    pub tags: Arc<FakeTags>,
    pub host: Arc<RecordingHost>,
    pub store: Arc<dyn ArtifactStore>,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new(toolchain: FakeToolchain, tags: FakeTags, host: RecordingHost) -> Self {
        Self::with_store(toolchain, tags, host, Arc::new(MemoryArtifactStore::new()))
    }

    pub fn with_store(
        toolchain: FakeToolchain,
        tags: FakeTags,
        host: RecordingHost,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(toolchain);
        let tags = Arc::new(tags);
        let host = Arc::new(host);

        let executor = MatrixExecutor::new(toolchain.clone(), BINARY, scratch.path().join("targets"))
            .with_hooks(HookRegistry::empty())
            .with_hosts(HostKind::ALL)
            .with_max_parallel(3);
        let packager = Packager::new(store.clone(), BINARY, scratch.path().join("archives"));
        let composer = ReleaseComposer::new(tags.clone(), host.clone());
        let pipeline = Pipeline::new(
            TargetCatalog::default(),
            TriggerGate::default(),
            executor,
            packager,
            composer,
            BINARY,
        );

        Self {
            pipeline,
            toolchain,
            tags,
            host,
            store,
            scratch,
        }
    }

    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }
}

pub const SIGNED_ANNOTATION: &str = "Webhook server 2.3.0\n\
\n\
- Configurable hook timeout\n\
- Graceful shutdown on SIGINT\n\
-----BEGIN PGP SIGNATURE-----\n\
\n\
iQEzBAABCAAdFiEEexample\n\
=abcd\n\
-----END PGP SIGNATURE-----\n";
