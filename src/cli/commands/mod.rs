//! Stage command execution.
//!
//! Each stage loads `release.toml`, resolves the event, and wires only the
//! collaborators it needs: `decide` and `matrix` touch nothing external,
//! `build` never needs a token, and `publish`/`run` ask for credentials only
//! once the gate has decided to release.

mod build;
mod decide;
mod matrix;
mod publish;
mod run;

use super::RuntimeConfig;
use super::args::{BuildArgs, Command, PublishArgs};
use crate::builder::{CargoToolchain, MatrixExecutor};
use crate::config::Config;
use crate::error::{CliError, PublishError, Result};
use crate::packager::Packager;
use crate::pipeline::RunOutcome;
use crate::release::{GithubReleases, ReleaseComposer, SystemGit, Token};
use crate::storage::FsArtifactStore;
use crate::utils::fs;
use anyhow::Context;
use path_absolutize::Absolutize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the selected stage; returns the process exit code.
pub async fn execute(command: Command, runtime: &RuntimeConfig) -> Result<i32> {
    match command {
        Command::Decide {
            event,
            github_output,
        } => decide::execute(runtime, &event, github_output.as_deref()),
        Command::Matrix { github_output } => matrix::execute(runtime, github_output.as_deref()),
        Command::Build {
            target,
            event,
            build,
        } => build::execute(runtime, &target, &event, &build).await,
        Command::Publish {
            event,
            staging,
            publish,
        } => publish::execute(runtime, &event, &staging.staging_dir, &publish).await,
        Command::Run {
            event,
            build,
            publish,
        } => run::execute(runtime, &event, &build, &publish).await,
    }
}

pub(crate) fn load_config(runtime: &RuntimeConfig) -> Result<Config> {
    let path = runtime.config_path();
    let config = Config::load(path)?;
    runtime.verbose_println(&format!(
        "Loaded {} (binary `{}`)",
        path.display(),
        config.binary
    ))?;
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path.absolutize()?.into_owned())
}

/// Workspace to build: flag, then `build.workspace` relative to the
/// config file, then the config file's directory.
pub(crate) fn resolve_workspace(
    runtime: &RuntimeConfig,
    config: &Config,
    flag: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return absolute(dir);
    }
    let config_dir = runtime
        .config_path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.build.workspace {
        Some(dir) => absolute(&config_dir.join(dir)),
        None => absolute(config_dir),
    }
}

/// Per-target cargo target directories and intermediate archives.
///
/// Without `--scratch-dir` the directory is a fresh temporary one, removed
/// by [`Scratch::cleanup`] or, when a run is interrupted, on drop.
pub(crate) struct Scratch {
    path: PathBuf,
    owned: Option<tempfile::TempDir>,
}

impl Scratch {
    pub(crate) async fn prepare(flag: Option<&Path>) -> Result<Self> {
        let scratch = match flag {
            Some(dir) => {
                let path = absolute(dir)?;
                fs::create_dir_all(&path, false).await?;
                Self { path, owned: None }
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("release-matrix-")
                    .tempdir()
                    .context("Failed to create scratch directory")?;
                Self {
                    path: dir.path().to_path_buf(),
                    owned: Some(dir),
                }
            }
        };
        log::debug!("Scratch directory {}", scratch.path.display());
        Ok(scratch)
    }

    pub(crate) fn targets_dir(&self) -> PathBuf {
        self.path.join("targets")
    }

    pub(crate) fn archives_dir(&self) -> PathBuf {
        self.path.join("archives")
    }

    /// Removes a scratch directory this run created
    pub(crate) async fn cleanup(self) {
        let Some(dir) = self.owned else {
            return;
        };
        let path = self.path;
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to remove {}: {}", path.display(), e),
            Err(e) => log::warn!("Cleanup of {} did not complete: {}", path.display(), e),
        }
    }
}

pub(crate) fn executor(
    config: &Config,
    workspace: PathBuf,
    scratch: &Scratch,
    build: &BuildArgs,
) -> MatrixExecutor {
    let toolchain = CargoToolchain::new(
        workspace,
        config.build.cargo_args.clone(),
        config.build_timeout(),
    );
    MatrixExecutor::new(Arc::new(toolchain), &config.binary, scratch.targets_dir())
        .with_max_parallel(build.max_parallel.unwrap_or_else(|| config.max_parallel()))
}

pub(crate) fn packager(config: &Config, staging_dir: &Path, scratch: &Scratch) -> Result<Packager> {
    let store = FsArtifactStore::new(absolute(staging_dir)?);
    Ok(Packager::new(
        Arc::new(store),
        &config.binary,
        scratch.archives_dir(),
    ))
}

/// GitHub-backed composer; fails without a token or repository.
pub(crate) fn composer(
    config: &Config,
    publish: &PublishArgs,
    repo_dir: &Path,
) -> Result<ReleaseComposer> {
    let token = publish
        .token
        .as_deref()
        .and_then(Token::new)
        .ok_or(PublishError::MissingToken)?;

    let (owner, name) = match (&config.repository.owner, &config.repository.name) {
        (Some(owner), Some(name)) => (owner.clone(), name.clone()),
        _ => publish
            .repository_parts()?
            .ok_or_else(|| CliError::MissingArgument {
                argument: "repository ([repository] in release.toml, --repository or GITHUB_REPOSITORY)"
                    .to_string(),
            })?,
    };

    let mut host = GithubReleases::new(&config.repository.api_url, owner, name, &token)?;
    if let Some(uploads) = &config.repository.uploads_url {
        host = host.with_uploads_url(uploads)?;
    }

    let mut tags = SystemGit::new(repo_dir, config.repository.remote.clone());
    if !config.repository.fetch_tags {
        tags = tags.without_fetch();
    }

    Ok(ReleaseComposer::new(Arc::new(tags), Arc::new(host))
        .with_draft_message(config.trigger.draft_message.clone()))
}

/// Appends `key=value` lines to a GitHub Actions output file.
pub(crate) fn write_github_output(path: &Path, pairs: &[(&str, String)]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open step output file {}", path.display()))?;
    for (key, value) in pairs {
        writeln!(file, "{key}={value}")
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Prints a finished run for operators (stderr) and machines (stdout).
pub(crate) fn report_outcome(runtime: &RuntimeConfig, outcome: &RunOutcome) -> Result<i32> {
    match outcome {
        RunOutcome::Skipped { reference } => {
            runtime.progress(&format!("Skipped {reference}: no release triggered"))?;
        }
        RunOutcome::Released(report) => {
            runtime.section(&format!(
                "{} {}",
                if report.draft { "Draft release" } else { "Release" },
                report.tag
            ))?;
            for asset in &report.assets {
                runtime.indent(&format!(
                    "{}  {} bytes  sha256:{}",
                    asset.name, asset.size, asset.sha256
                ))?;
            }
            runtime.success(&format!("Published {}", report.url))?;
        }
    }
    let json = serde_json::to_string_pretty(outcome)?;
    runtime.output().data(&json)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupted_run_removes_its_scratch_directory() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let run = async move {
            let scratch = Scratch::prepare(None).await.unwrap();
            tx.send(scratch.path.clone()).unwrap();
            std::future::pending::<()>().await;
            scratch.cleanup().await;
        };

        let path = tokio::select! {
            _ = run => unreachable!("the run never finishes on its own"),
            path = rx => path.unwrap(),
        };
        assert!(!path.exists(), "{} was left behind", path.display());
    }

    #[tokio::test]
    async fn cleanup_keeps_a_user_supplied_directory() {
        let dir = tempfile::tempdir().unwrap();
        let flag = dir.path().join("scratch");
        let scratch = Scratch::prepare(Some(&flag)).await.unwrap();
        assert!(flag.is_dir());
        scratch.cleanup().await;
        assert!(flag.is_dir());

        let owned = Scratch::prepare(None).await.unwrap();
        let path = owned.path.clone();
        owned.cleanup().await;
        assert!(!path.exists());
    }
}
