//! Trigger gate: maps an event to a release decision.
//!
//! Rules form an ordered table of `pattern → decision`. The first matching
//! rule wins; a reference matching nothing is a normal skip, not an error.
//! Pull requests never reach the table.

use super::event::{EventKind, TriggerEvent};
use crate::error::{ConfigError, TriggerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the trigger gate, shared read-only by every later stage
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseDecision {
    /// Do nothing: no builds, no archives, no release
    Skip,
    /// Build and publish a real release from the tag
    Release,
    /// Build and publish a disposable draft release
    Draft,
}

impl ReleaseDecision {
    /// Whether anything should be built
    pub fn should_build(&self) -> bool {
        !matches!(self, ReleaseDecision::Skip)
    }

    /// Whether the published release is a draft
    pub fn is_draft(&self) -> bool {
        matches!(self, ReleaseDecision::Draft)
    }
}

impl fmt::Display for ReleaseDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleaseDecision::Skip => "skip",
            ReleaseDecision::Release => "release",
            ReleaseDecision::Draft => "draft",
        })
    }
}

/// How a rule pattern is compared against the full reference
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Reference starts with the pattern
    #[default]
    Prefix,
    /// Reference equals the pattern
    Exact,
    /// Reference matches the regular expression
    Regex,
}

/// Rule as written in `release.toml`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Pattern compared against the full reference (`refs/...`)
    pub pattern: String,
    /// Comparison mode
    #[serde(default, rename = "match")]
    pub kind: MatchKind,
    /// Decision when the pattern matches
    pub decision: ReleaseDecision,
}

/// Compiled reference pattern
#[derive(Clone, Debug)]
pub enum RefPattern {
    /// Prefix match
    Prefix(String),
    /// Exact match
    Exact(String),
    /// Regular expression match
    Regex(regex::Regex),
}

impl RefPattern {
    /// Whether the reference satisfies this pattern
    pub fn matches(&self, reference: &str) -> bool {
        match self {
            RefPattern::Prefix(prefix) => reference.starts_with(prefix.as_str()),
            RefPattern::Exact(exact) => reference == exact,
            RefPattern::Regex(re) => re.is_match(reference),
        }
    }
}

impl fmt::Display for RefPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefPattern::Prefix(p) => write!(f, "{p}*"),
            RefPattern::Exact(e) => f.write_str(e),
            RefPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// One row of the predicate table
#[derive(Clone, Debug)]
pub struct TriggerRule {
    /// Reference pattern
    pub pattern: RefPattern,
    /// Decision on match
    pub decision: ReleaseDecision,
}

impl TriggerRule {
    /// Compiles a rule from its config form.
    pub fn compile(config: &RuleConfig) -> Result<Self, ConfigError> {
        if config.pattern.is_empty() {
            return Err(ConfigError::InvalidRule {
                pattern: config.pattern.clone(),
                reason: "pattern is empty".into(),
            });
        }
        let pattern = match config.kind {
            MatchKind::Prefix => RefPattern::Prefix(config.pattern.clone()),
            MatchKind::Exact => RefPattern::Exact(config.pattern.clone()),
            MatchKind::Regex => {
                let re = regex::Regex::new(&config.pattern).map_err(|e| {
                    ConfigError::InvalidRule {
                        pattern: config.pattern.clone(),
                        reason: e.to_string(),
                    }
                })?;
                RefPattern::Regex(re)
            }
        };
        Ok(Self {
            pattern,
            decision: config.decision,
        })
    }
}

/// Ordered predicate table deciding whether a run releases.
#[derive(Clone, Debug)]
pub struct TriggerGate {
    rules: Vec<TriggerRule>,
}

impl TriggerGate {
    /// Gate over an explicit rule table
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    /// Standard table: the test branch drafts, version-prefixed tags release.
    ///
    /// Each prefix is relative to `refs/tags/`, so `v2` accepts `v2.3.0` and
    /// `v20.0.0` alike.
    pub fn with_version_prefixes<S: AsRef<str>>(prefixes: &[S], test_branch: Option<&str>) -> Self {
        let mut rules = Vec::with_capacity(prefixes.len() + 1);
        if let Some(branch) = test_branch {
            rules.push(TriggerRule {
                pattern: RefPattern::Exact(format!("refs/heads/{branch}")),
                decision: ReleaseDecision::Draft,
            });
        }
        rules.extend(prefixes.iter().map(|prefix| TriggerRule {
            pattern: RefPattern::Prefix(format!("refs/tags/{}", prefix.as_ref())),
            decision: ReleaseDecision::Release,
        }));
        Self { rules }
    }

    /// Compiles a configured table
    pub fn from_rules(configs: &[RuleConfig]) -> Result<Self, ConfigError> {
        let rules = configs
            .iter()
            .map(TriggerRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    /// Decides what the event triggers.
    pub fn decide(&self, event: &TriggerEvent) -> ReleaseDecision {
        if event.kind == EventKind::PullRequest {
            log::info!("Skipping {}: releases only originate from pushes", event);
            return ReleaseDecision::Skip;
        }

        match self
            .rules
            .iter()
            .find(|rule| rule.pattern.matches(&event.reference))
        {
            Some(rule) => {
                log::info!(
                    "{} matched rule {} → {}",
                    event.reference,
                    rule.pattern,
                    rule.decision
                );
                rule.decision
            }
            None => {
                log::info!("{} matched no trigger rule → skip", event.reference);
                ReleaseDecision::Skip
            }
        }
    }

    /// Decides like [`decide`](Self::decide), but refuses to build a release
    /// whose name cannot be embedded in an asset file name.
    pub fn admit(&self, event: &TriggerEvent) -> Result<ReleaseDecision, TriggerError> {
        let decision = self.decide(event);
        if decision.should_build() {
            check_release_name(event)?;
        }
        Ok(decision)
    }
}

fn check_release_name(event: &TriggerEvent) -> Result<(), TriggerError> {
    let name = event.short_name();
    let reason = if name.is_empty() {
        "release name is empty"
    } else if name.contains(['/', '\\']) {
        "release name contains a path separator"
    } else if name == "." || name == ".." {
        "release name is a relative path"
    } else if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        "release name contains whitespace or control characters"
    } else {
        return Ok(());
    };
    Err(TriggerError::InvalidReleaseName {
        reference: event.reference.clone(),
        reason,
    })
}

/// Major-version prefixes accepted by default: `v0` through `v9`.
pub fn default_version_prefixes() -> Vec<String> {
    (0..10).map(|major| format!("v{major}")).collect()
}

/// Branch whose pushes produce draft releases by default.
pub const DEFAULT_TEST_BRANCH: &str = "release-test";

impl Default for TriggerGate {
    fn default() -> Self {
        Self::with_version_prefixes(&default_version_prefixes(), Some(DEFAULT_TEST_BRANCH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_requests_always_skip() {
        let gate = TriggerGate::default();
        for reference in [
            "refs/tags/v2.3.0",
            "refs/heads/release-test",
            "refs/heads/feature-x",
        ] {
            assert_eq!(
                gate.decide(&TriggerEvent::pull_request(reference)),
                ReleaseDecision::Skip,
                "{reference}"
            );
        }
    }

    #[test]
    fn version_tags_release() {
        let gate = TriggerGate::default();
        for reference in ["refs/tags/v0.1.0", "refs/tags/v2.3.0", "refs/tags/v9.0.0-rc.1"] {
            assert_eq!(
                gate.decide(&TriggerEvent::push(reference)),
                ReleaseDecision::Release,
                "{reference}"
            );
        }
    }

    #[test]
    fn test_branch_drafts() {
        let gate = TriggerGate::default();
        assert_eq!(
            gate.decide(&TriggerEvent::push("refs/heads/release-test")),
            ReleaseDecision::Draft
        );
    }

    #[test]
    fn unmatched_references_skip() {
        let gate = TriggerGate::default();
        for reference in [
            "refs/heads/main",
            "refs/heads/release-test-2",
            "refs/tags/nightly",
            "refs/tags/va.1",
            "refs/heads/v1.0.0",
            "v1.0.0",
        ] {
            assert_eq!(
                gate.decide(&TriggerEvent::push(reference)),
                ReleaseDecision::Skip,
                "{reference}"
            );
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let gate = TriggerGate::from_rules(&[
            RuleConfig {
                pattern: "refs/tags/v1.0.0-".into(),
                kind: MatchKind::Prefix,
                decision: ReleaseDecision::Draft,
            },
            RuleConfig {
                pattern: r"^refs/tags/v1\.\d+\.\d+".into(),
                kind: MatchKind::Regex,
                decision: ReleaseDecision::Release,
            },
        ])
        .unwrap();
        assert_eq!(
            gate.decide(&TriggerEvent::push("refs/tags/v1.0.0-beta")),
            ReleaseDecision::Draft
        );
        assert_eq!(
            gate.decide(&TriggerEvent::push("refs/tags/v1.4.2")),
            ReleaseDecision::Release
        );
        assert_eq!(
            gate.decide(&TriggerEvent::push("refs/tags/v2.0.0")),
            ReleaseDecision::Skip
        );
    }

    #[test]
    fn tag_with_path_separator_is_refused() {
        let gate = TriggerGate::default();
        let event = TriggerEvent::push("refs/tags/v1/foo");
        assert_eq!(gate.decide(&event), ReleaseDecision::Release);
        let err = gate.admit(&event).unwrap_err();
        assert!(err.to_string().contains("refs/tags/v1/foo"));
        assert!(err.to_string().contains("path separator"));
    }

    #[test]
    fn admit_passes_skips_and_plain_names_through() {
        let gate = TriggerGate::default();
        assert_eq!(
            gate.admit(&TriggerEvent::push("refs/tags/v2.3.0")).unwrap(),
            ReleaseDecision::Release
        );
        assert_eq!(
            gate.admit(&TriggerEvent::push("refs/heads/feature/x")).unwrap(),
            ReleaseDecision::Skip
        );
    }

    #[test]
    fn invalid_regex_is_configuration_error() {
        let err = TriggerGate::from_rules(&[RuleConfig {
            pattern: "refs/tags/(".into(),
            kind: MatchKind::Regex,
            decision: ReleaseDecision::Release,
        }])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }
}
