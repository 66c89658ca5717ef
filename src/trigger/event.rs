//! Incoming repository events.

use crate::error::CliError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of repository event that started the run
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Direct push of a branch or tag
    Push,
    /// Pull request opened or updated
    PullRequest,
}

impl std::str::FromStr for EventKind {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull_request_target" => Ok(EventKind::PullRequest),
            other => Err(CliError::InvalidArguments {
                reason: format!("unsupported event kind `{other}` (expected push or pull_request)"),
            }),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => f.write_str("push"),
            EventKind::PullRequest => f.write_str("pull_request"),
        }
    }
}

/// Whether a bare reference names a tag or a branch
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefType {
    /// `refs/tags/...`
    Tag,
    /// `refs/heads/...`
    Branch,
}

impl std::str::FromStr for RefType {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tag" => Ok(RefType::Tag),
            "branch" => Ok(RefType::Branch),
            other => Err(CliError::InvalidArguments {
                reason: format!("unsupported ref type `{other}` (expected tag or branch)"),
            }),
        }
    }
}

/// The signal one CI invocation is evaluated against. Read-only once built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TriggerEvent {
    /// Push or pull request
    pub kind: EventKind,
    /// Full reference, e.g. `refs/tags/v2.3.0`
    pub reference: String,
    /// Whether the reference is a tag
    pub is_tag: bool,
}

impl TriggerEvent {
    /// Builds an event from a full reference.
    pub fn new(kind: EventKind, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let is_tag = reference.starts_with("refs/tags/");
        Self {
            kind,
            reference,
            is_tag,
        }
    }

    /// Builds an event, qualifying a bare reference with its namespace.
    ///
    /// `v2.3.0` with [`RefType::Tag`] becomes `refs/tags/v2.3.0`. References
    /// that already start with `refs/` are kept as they are.
    pub fn qualified(kind: EventKind, reference: &str, ref_type: Option<RefType>) -> Self {
        let reference = match ref_type {
            _ if reference.starts_with("refs/") => reference.to_string(),
            Some(RefType::Tag) => format!("refs/tags/{reference}"),
            Some(RefType::Branch) => format!("refs/heads/{reference}"),
            None => reference.to_string(),
        };
        Self::new(kind, reference)
    }

    /// Push event for a full reference
    pub fn push(reference: impl Into<String>) -> Self {
        Self::new(EventKind::Push, reference)
    }

    /// Pull-request event for a full reference
    pub fn pull_request(reference: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, reference)
    }

    /// Parses a GitHub webhook / Actions event payload.
    ///
    /// Payloads carrying a `pull_request` object are pull-request events whose
    /// reference is the head branch; everything else needs a top-level `ref`.
    pub fn from_github_payload(payload: &serde_json::Value) -> Result<Self, CliError> {
        if let Some(pr) = payload.get("pull_request") {
            let head = pr
                .get("head")
                .and_then(|h| h.get("ref"))
                .and_then(|r| r.as_str())
                .ok_or_else(|| CliError::InvalidArguments {
                    reason: "pull_request payload without head.ref".into(),
                })?;
            return Ok(Self::qualified(
                EventKind::PullRequest,
                head,
                Some(RefType::Branch),
            ));
        }

        let reference = payload
            .get("ref")
            .and_then(|r| r.as_str())
            .ok_or_else(|| CliError::MissingArgument {
                argument: "ref (event payload)".into(),
            })?;

        let ref_type = match payload.get("ref_type").and_then(|r| r.as_str()) {
            Some(value) => Some(value.parse()?),
            None => None,
        };

        Ok(Self::qualified(EventKind::Push, reference, ref_type))
    }

    /// Reference without its `refs/<namespace>/` prefix
    pub fn short_name(&self) -> &str {
        short_ref(&self.reference)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.reference)
    }
}

/// Strips the `refs/<namespace>/` prefix from a reference.
///
/// ```
/// use release_matrix::trigger::short_ref;
///
/// assert_eq!(short_ref("refs/tags/v2.3.0"), "v2.3.0");
/// assert_eq!(short_ref("refs/heads/release-test"), "release-test");
/// assert_eq!(short_ref("v2.3.0"), "v2.3.0");
/// ```
pub fn short_ref(reference: &str) -> &str {
    reference
        .strip_prefix("refs/")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, name)| name)
        .unwrap_or(reference)
}
