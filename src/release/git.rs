//! Tag annotations from the version-control system.

use crate::error::TagFetchError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Source of annotated tags.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Makes the tag object available locally
    async fn fetch_tag(&self, tag: &str) -> Result<(), TagFetchError>;

    /// Annotation text of an annotated tag
    async fn annotation(&self, tag: &str) -> Result<String, TagFetchError>;
}

/// Tag source backed by `git` subprocesses in a local clone.
#[derive(Clone, Debug)]
pub struct SystemGit {
    repo: PathBuf,
    remote: String,
    fetch: bool,
}

impl SystemGit {
    /// Git access to the clone at `repo`, fetching tags from `remote`
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
            fetch: true,
        }
    }

    /// Disables fetching; tags must already be present locally
    pub fn without_fetch(mut self) -> Self {
        self.fetch = false;
        self
    }

    async fn git(&self, args: &[&str]) -> Result<String, TagFetchError> {
        let command = format!("git {}", args.join(" "));
        log::debug!("Running `{}` in {}", command, self.repo.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TagFetchError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TagFetchError::Git {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn check_name(tag: &str) -> Result<(), TagFetchError> {
        // A leading dash would be parsed by git as an option
        if tag.is_empty() || tag.starts_with('-') {
            return Err(TagFetchError::NotFound {
                tag: tag.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TagSource for SystemGit {
    async fn fetch_tag(&self, tag: &str) -> Result<(), TagFetchError> {
        Self::check_name(tag)?;
        if !self.fetch {
            return Ok(());
        }
        // Checkouts made by CI runners usually omit tag objects
        let refspec = format!("refs/tags/{tag}:refs/tags/{tag}");
        self.git(&["fetch", "--force", "--no-tags", &self.remote, &refspec])
            .await?;
        log::info!("Fetched tag {} from {}", tag, self.remote);
        Ok(())
    }

    async fn annotation(&self, tag: &str) -> Result<String, TagFetchError> {
        Self::check_name(tag)?;
        let reference = format!("refs/tags/{tag}");

        let kind = match self.git(&["cat-file", "-t", &reference]).await {
            Ok(kind) => kind,
            Err(TagFetchError::Git { .. }) => {
                return Err(TagFetchError::NotFound {
                    tag: tag.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        if kind.trim() != "tag" {
            return Err(TagFetchError::NotAnnotated {
                tag: tag.to_string(),
            });
        }

        let contents = self
            .git(&["for-each-ref", "--format=%(contents)", &reference])
            .await?;
        // for-each-ref terminates each record with a newline
        Ok(contents
            .strip_suffix('\n')
            .map(str::to_string)
            .unwrap_or(contents))
    }
}
