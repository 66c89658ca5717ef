//! One release run: gate, build matrix, barrier, compose and publish.
//!
//! Nothing is published until every cell of the matrix has joined. A single
//! failed cell turns the run into [`ReleaseError::MatrixFailed`] and the
//! release host is never contacted.

use crate::builder::MatrixExecutor;
use crate::catalog::{Target, TargetCatalog};
use crate::error::{CellFailure, FailureReport, ReleaseError, Result};
use crate::packager::{Artifact, Packager, asset_name};
use crate::release::ReleaseComposer;
use crate::trigger::{ReleaseDecision, TriggerEvent, TriggerGate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// One attached asset in a run report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssetReport {
    /// Asset name
    pub name: String,
    /// Target triple
    pub target: String,
    /// Archive size in bytes
    pub size: u64,
    /// Hex SHA-256
    pub sha256: String,
}

impl From<&Artifact> for AssetReport {
    fn from(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            target: artifact.target.clone(),
            size: artifact.size(),
            sha256: artifact.sha256.clone(),
        }
    }
}

/// Summary of a published release
#[derive(Clone, Debug, Serialize)]
pub struct ReleaseReport {
    /// Tag name
    pub tag: String,
    /// Published as a draft
    pub draft: bool,
    /// Marked as pre-release
    pub prerelease: bool,
    /// Web URL of the release
    pub url: String,
    /// Assets in attachment order
    pub assets: Vec<AssetReport>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When publishing finished
    pub finished_at: DateTime<Utc>,
}

/// How a run ended, when it did not fail
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RunOutcome {
    /// The trigger gate skipped the event
    Skipped {
        /// Reference that was skipped
        reference: String,
    },
    /// A release was published
    Released(ReleaseReport),
}

/// Builds one target and stages its archive.
///
/// Whatever the target had staged for `tag` is removed first, so the staging
/// store only ever holds this cell's archive or nothing.
pub async fn build_and_package(
    executor: &MatrixExecutor,
    packager: &Packager,
    target: &Target,
    tag: &str,
) -> Result<Artifact> {
    packager.discard(target, tag).await?;
    let built = executor.build_one(target).await.into_success()?;
    Ok(packager.package(&built, tag).await?)
}

/// Wires gate, executor, packager and composer for one invocation.
#[derive(Clone, Debug)]
pub struct Pipeline {
    catalog: Arc<TargetCatalog>,
    gate: Arc<TriggerGate>,
    executor: MatrixExecutor,
    packager: Packager,
    composer: ReleaseComposer,
    binary: String,
}

impl Pipeline {
    /// Creates a pipeline over `catalog`.
    pub fn new(
        catalog: TargetCatalog,
        gate: TriggerGate,
        executor: MatrixExecutor,
        packager: Packager,
        composer: ReleaseComposer,
        binary: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            gate: Arc::new(gate),
            executor,
            packager,
            composer,
            binary: binary.into(),
        }
    }

    /// Target catalog
    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// Gate decision for `event`
    pub fn decide(&self, event: &TriggerEvent) -> Result<ReleaseDecision> {
        Ok(self.gate.admit(event)?)
    }

    /// Runs every stage in this process.
    pub async fn run(&self, event: &TriggerEvent) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let decision = self.decide(event)?;
        if !decision.should_build() {
            return Ok(RunOutcome::Skipped {
                reference: event.reference.clone(),
            });
        }

        let tag = event.short_name().to_string();
        let artifacts = self.run_matrix(&tag).await?;
        let report = self
            .release(decision, &event.reference, artifacts, started_at)
            .await?;
        Ok(RunOutcome::Released(report))
    }

    /// Builds every catalog target, joins, then packages each binary.
    ///
    /// Returns the artifacts in catalog order, or the failures of every
    /// cell that did not produce one.
    pub async fn run_matrix(&self, tag: &str) -> Result<Vec<Artifact>> {
        let targets = self.catalog.list_targets();
        log::info!(
            "Running {} matrix cell(s) for {} (max {} in parallel)",
            targets.len(),
            tag,
            self.executor.max_parallel()
        );

        for target in targets {
            self.packager.discard(target, tag).await?;
        }
        let results = self.executor.build(targets).await;

        let total = results.len();
        let mut artifacts = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in results {
            let triple = result.target.triple.clone();
            let packaged = match result.into_success() {
                Ok(built) => self
                    .packager
                    .package(&built, tag)
                    .await
                    .map_err(ReleaseError::from),
                Err(error) => Err(ReleaseError::from(error)),
            };
            match packaged {
                Ok(artifact) => artifacts.push(artifact),
                Err(error) => failures.push(CellFailure {
                    target: triple,
                    cause: error.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(artifacts)
        } else {
            let report = FailureReport { failures, total };
            log::error!("{}", report);
            Err(ReleaseError::MatrixFailed(report))
        }
    }

    /// One cell: build, package and stage a single target.
    pub async fn build_cell(&self, target: &Target, tag: &str) -> Result<Artifact> {
        build_and_package(&self.executor, &self.packager, target, tag).await
    }

    /// Publishes from artifacts already in the staging store.
    ///
    /// Every catalog target must have its asset staged; otherwise the run
    /// fails the same way a failed matrix does and nothing is published.
    pub async fn publish_staged(&self, event: &TriggerEvent) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let decision = self.decide(event)?;
        if !decision.should_build() {
            return Ok(RunOutcome::Skipped {
                reference: event.reference.clone(),
            });
        }

        let tag = event.short_name().to_string();
        let store = self.packager.store();
        let staged: HashSet<String> = store.list().await?.into_iter().collect();

        let targets = self.catalog.list_targets();
        let mut artifacts = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();
        for target in targets {
            let name = asset_name(&self.binary, &tag, target);
            if !staged.contains(&name) {
                failures.push(CellFailure {
                    target: target.triple.clone(),
                    cause: format!("no staged artifact {name}"),
                });
                continue;
            }
            match store.retrieve(&name).await {
                Ok(content) => artifacts.push(Artifact::from_staged(name, content, target)),
                Err(e) => failures.push(CellFailure {
                    target: target.triple.clone(),
                    cause: format!("failed to read staged artifact {name}: {e}"),
                }),
            }
        }

        if !failures.is_empty() {
            return Err(ReleaseError::MatrixFailed(FailureReport {
                failures,
                total: targets.len(),
            }));
        }

        let report = self
            .release(decision, &event.reference, artifacts, started_at)
            .await?;
        Ok(RunOutcome::Released(report))
    }

    async fn release(
        &self,
        decision: ReleaseDecision,
        reference: &str,
        artifacts: Vec<Artifact>,
        started_at: DateTime<Utc>,
    ) -> Result<ReleaseReport> {
        let release = self.composer.compose(decision, reference, artifacts).await?;
        let published = self.composer.publish(&release).await?;
        Ok(ReleaseReport {
            tag: release.tag.clone(),
            draft: release.draft,
            prerelease: release.prerelease,
            url: published.url,
            assets: release.artifacts.iter().map(AssetReport::from).collect(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}
