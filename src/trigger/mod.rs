//! Trigger evaluation: which events build, and whether they release for real.

mod event;
mod gate;

pub use event::{EventKind, RefType, TriggerEvent, short_ref};
pub use gate::{
    DEFAULT_TEST_BRANCH, MatchKind, RefPattern, ReleaseDecision, RuleConfig, TriggerGate,
    TriggerRule, default_version_prefixes,
};
