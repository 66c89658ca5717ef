//! Release composition and publishing.

use super::git::TagSource;
use super::github::{AssetUpload, PublishedRelease, ReleaseHost, ReleaseRequest};
use super::message::{ReleaseMessage, release_body};
use crate::config::DEFAULT_DRAFT_MESSAGE;
use crate::error::{ReleaseError, Result};
use crate::packager::Artifact;
use crate::trigger::{ReleaseDecision, short_ref};
use std::fmt;
use std::sync::Arc;

/// A release ready to publish
#[derive(Clone, Debug)]
pub struct Release {
    /// Tag name
    pub tag: String,
    /// Release notes
    pub body: String,
    /// Created as a draft
    pub draft: bool,
    /// Tag carries a semver pre-release component
    pub prerelease: bool,
    /// Assets in attachment order
    pub artifacts: Vec<Artifact>,
}

impl Release {
    /// Request sent to the release host
    pub fn to_request(&self) -> ReleaseRequest {
        ReleaseRequest {
            tag: self.tag.clone(),
            name: self.tag.clone(),
            body: self.body.clone(),
            draft: self.draft,
            prerelease: self.prerelease,
            assets: self
                .artifacts
                .iter()
                .map(|artifact| AssetUpload {
                    name: artifact.name.clone(),
                    content_type: artifact.format.content_type().to_string(),
                    content: artifact.content.clone(),
                })
                .collect(),
        }
    }
}

/// Whether a tag names a semver pre-release (`v2.0.0-rc.1`)
pub fn is_prerelease(tag: &str) -> bool {
    let version = tag.strip_prefix('v').unwrap_or(tag);
    semver::Version::parse(version)
        .map(|v| !v.pre.is_empty())
        .unwrap_or(false)
}

/// Derives release messages and publishes releases.
#[derive(Clone)]
pub struct ReleaseComposer {
    tags: Arc<dyn TagSource>,
    host: Arc<dyn ReleaseHost>,
    draft_message: String,
}

impl ReleaseComposer {
    /// Composer reading tags from `tags` and publishing to `host`
    pub fn new(tags: Arc<dyn TagSource>, host: Arc<dyn ReleaseHost>) -> Self {
        Self {
            tags,
            host,
            draft_message: DEFAULT_DRAFT_MESSAGE.to_string(),
        }
    }

    /// Body used for draft releases
    pub fn with_draft_message(mut self, message: impl Into<String>) -> Self {
        self.draft_message = message.into();
        self
    }

    /// Tag name and body for a release of `reference`.
    ///
    /// Real releases read the annotation of the tag and drop its signature;
    /// drafts use the placeholder and never touch the tag.
    pub async fn derive_message(
        &self,
        decision: ReleaseDecision,
        reference: &str,
    ) -> Result<ReleaseMessage> {
        let tag = short_ref(reference).to_string();
        let body = match decision {
            ReleaseDecision::Skip => {
                return Err(ReleaseError::NothingToRelease {
                    reference: reference.to_string(),
                });
            }
            ReleaseDecision::Draft => self.draft_message.clone(),
            ReleaseDecision::Release => {
                self.tags.fetch_tag(&tag).await?;
                let annotation = self.tags.annotation(&tag).await?;
                release_body(&annotation)
            }
        };
        Ok(ReleaseMessage { tag, body })
    }

    /// Builds the release for `decision` with `artifacts` attached in order.
    pub async fn compose(
        &self,
        decision: ReleaseDecision,
        reference: &str,
        artifacts: Vec<Artifact>,
    ) -> Result<Release> {
        let message = self.derive_message(decision, reference).await?;
        let draft = decision.is_draft();
        let prerelease = !draft && is_prerelease(&message.tag);
        log::info!(
            "Composed {} release {} with {} asset(s)",
            if draft { "draft" } else { "real" },
            message.tag,
            artifacts.len()
        );
        Ok(Release {
            tag: message.tag,
            body: message.body,
            draft,
            prerelease,
            artifacts,
        })
    }

    /// Publishes exactly one release with all of its assets.
    pub async fn publish(&self, release: &Release) -> Result<PublishedRelease> {
        let published = self.host.publish(&release.to_request()).await?;
        log::info!("Published {} at {}", release.tag, published.url);
        Ok(published)
    }
}

impl fmt::Debug for ReleaseComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseComposer")
            .field("draft_message", &self.draft_message)
            .finish_non_exhaustive()
    }
}
