//! Release composition: message derivation, tag access and publishing.
//!
//! - [`message`] - Signature stripping over annotation text
//! - [`git`] - [`TagSource`] and its `git` subprocess binding
//! - [`github`] - [`ReleaseHost`] and the GitHub REST binding
//! - [`composer`] - [`ReleaseComposer`], which ties the two together

pub mod composer;
pub mod git;
pub mod github;
pub mod message;

pub use composer::{Release, ReleaseComposer, is_prerelease};
pub use git::{SystemGit, TagSource};
pub use github::{
    AssetUpload, GithubReleases, PublishedRelease, ReleaseHost, ReleaseRequest, Token,
    classify_error,
};
pub use message::{ReleaseMessage, SIGNATURE_MARKERS, release_body, strip_signature};
