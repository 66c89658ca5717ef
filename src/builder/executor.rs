//! Build matrix execution.
//!
//! This module provides the [`MatrixExecutor`] that turns every catalog target
//! into exactly one [`BuildResult`], and the [`fan_out`] primitive used to run
//! matrix cells in parallel behind a single join barrier.

use super::hooks::HookRegistry;
use super::toolchain::{BuildRequest, Toolchain};
use super::{BuildResult, BuildStatus};
use crate::catalog::{HostKind, Target};
use crate::error::ToolchainError;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs one async cell per target and waits for all of them.
///
/// At most `max_parallel` cells run at once. Results come back in target
/// order; a cell whose task panicked or was aborted yields `Err` with the
/// join error. Dropping the returned future aborts every in-flight cell.
pub async fn fan_out<T, F, Fut>(
    targets: &[Target],
    max_parallel: usize,
    cell: F,
) -> Vec<(Target, Result<T, String>)>
where
    F: Fn(Target) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut set = JoinSet::new();

    for (index, target) in targets.iter().cloned().enumerate() {
        let permits = Arc::clone(&permits);
        let work = cell(target);
        set.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            (index, work.await)
        });
    }

    let mut slots: Vec<Option<T>> = targets.iter().map(|_| None).collect();
    let mut join_errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, value)) => slots[index] = Some(value),
            Err(e) => join_errors.push(e.to_string()),
        }
    }

    let reason = if join_errors.is_empty() {
        "task did not report a result".to_string()
    } else {
        join_errors.join("; ")
    };

    targets
        .iter()
        .cloned()
        .zip(slots)
        .map(|(target, slot)| (target, slot.ok_or_else(|| reason.clone())))
        .collect()
}

/// Build matrix executor.
///
/// Each cell selects its host environment, runs the pre-build hooks of that
/// host, then invokes the toolchain with an isolated target directory. Cells
/// share nothing mutable; one failure never affects a sibling.
#[derive(Clone)]
pub struct MatrixExecutor {
    toolchain: Arc<dyn Toolchain>,
    hooks: Arc<HookRegistry>,
    hosts: Arc<HashSet<HostKind>>,
    binary: String,
    scratch_dir: PathBuf,
    max_parallel: usize,
}

impl std::fmt::Debug for MatrixExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixExecutor")
            .field("hooks", &self.hooks)
            .field("hosts", &self.hosts)
            .field("binary", &self.binary)
            .field("scratch_dir", &self.scratch_dir)
            .field("max_parallel", &self.max_parallel)
            .finish()
    }
}

impl MatrixExecutor {
    /// Creates an executor for the current host.
    ///
    /// # Arguments
    ///
    /// * `toolchain` - Produces binaries
    /// * `binary` - Binary name passed to the toolchain
    /// * `scratch_dir` - Parent of the per-cell target directories
    pub fn new(toolchain: Arc<dyn Toolchain>, binary: impl Into<String>, scratch_dir: PathBuf) -> Self {
        Self {
            toolchain,
            hooks: Arc::new(HookRegistry::standard()),
            hosts: Arc::new(HostKind::current().into_iter().collect()),
            binary: binary.into(),
            scratch_dir,
            max_parallel: num_cpus::get(),
        }
    }

    /// Replaces the pre-build hook registry
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Host kinds this executor can provide (the current host by default)
    pub fn with_hosts(mut self, hosts: impl IntoIterator<Item = HostKind>) -> Self {
        self.hosts = Arc::new(hosts.into_iter().collect());
        self
    }

    /// Maximum concurrent cells
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Concurrent cell limit
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Builds one target.
    pub async fn build_one(&self, target: &Target) -> BuildResult {
        log::info!(
            "[{}] Building on {} host ({})",
            target.triple,
            target.host_environment(),
            if target.requires_cross_compilation() {
                "cross"
            } else {
                "native"
            }
        );

        let status = match self.try_build(target).await {
            Ok(binary) => {
                log::info!("[{}] ✓ Built {}", target.triple, binary.display());
                BuildStatus::Success { binary }
            }
            Err(error) => {
                log::error!("[{}] ✗ Build failed: {}", target.triple, error);
                BuildStatus::Failure(error)
            }
        };

        BuildResult {
            target: target.clone(),
            status,
        }
    }

    async fn try_build(&self, target: &Target) -> Result<PathBuf, ToolchainError> {
        let host = target.host_environment();
        if !self.hosts.contains(&host) {
            let mut available: Vec<&str> = self.hosts.iter().map(HostKind::as_str).collect();
            available.sort_unstable();
            return Err(ToolchainError::HostUnavailable {
                triple: target.triple.clone(),
                required: host.to_string(),
                available: if available.is_empty() {
                    "an unsupported host".to_string()
                } else {
                    available.join("/")
                },
            });
        }

        let env = self.hooks.prepare(host).await?;
        let request = BuildRequest {
            target: target.clone(),
            binary: self.binary.clone(),
            target_dir: self.scratch_dir.join(&target.triple),
            env,
        };
        self.toolchain.build(&request).await
    }

    /// Builds every target in parallel; exactly one result per target, in order.
    pub async fn build(&self, targets: &[Target]) -> Vec<BuildResult> {
        let executor = self.clone();
        fan_out(targets, self.max_parallel, move |target| {
            let executor = executor.clone();
            async move { executor.build_one(&target).await }
        })
        .await
        .into_iter()
        .map(|(target, joined)| {
            joined.unwrap_or_else(|reason| BuildResult {
                status: BuildStatus::Failure(ToolchainError::TaskAborted {
                    triple: target.triple.clone(),
                    reason,
                }),
                target,
            })
        })
        .collect()
    }
}
