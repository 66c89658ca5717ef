//! End-to-end runs of the pipeline against in-memory collaborators.

mod common;

use common::{BINARY, FakeTags, FakeToolchain, Harness, RecordingHost, SIGNED_ANNOTATION};
use release_matrix::catalog::default_targets;
use release_matrix::packager::{ArchiveFormat, asset_name};
use release_matrix::trigger::TriggerEvent;
use release_matrix::{ReleaseError, RunOutcome};

#[tokio::test]
async fn version_tag_publishes_real_release_with_every_target() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v2.3.0", SIGNED_ANNOTATION),
        RecordingHost::default(),
    );

    let outcome = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v2.3.0"))
        .await
        .unwrap();

    let RunOutcome::Released(report) = outcome else {
        panic!("expected a release, got {outcome:?}");
    };
    assert_eq!(report.tag, "v2.3.0");
    assert!(!report.draft);
    assert!(!report.prerelease);
    assert_eq!(report.assets.len(), 7);

    assert_eq!(harness.host.publish_count(), 1);
    let requests = harness.host.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.tag, "v2.3.0");
    assert!(!request.draft);
    assert_eq!(
        request.body,
        "Webhook server 2.3.0\n\n- Configurable hook timeout\n- Graceful shutdown on SIGINT"
    );

    // Catalog order, one uniquely named asset per target
    let expected: Vec<String> = default_targets()
        .iter()
        .map(|t| asset_name(BINARY, "v2.3.0", t))
        .collect();
    let attached: Vec<String> = request.assets.iter().map(|a| a.name.clone()).collect();
    assert_eq!(attached, expected);
    assert!(attached.contains(&"webhook-server-v2.3.0-x86_64-pc-windows-msvc.zip".to_string()));
    assert!(attached.contains(&"webhook-server-v2.3.0-aarch64-apple-darwin.tar.gz".to_string()));

    assert_eq!(*harness.tags.fetched.lock().unwrap(), vec!["v2.3.0"]);
    assert_eq!(harness.toolchain.call_count(), 7);
}

#[tokio::test]
async fn test_branch_publishes_draft_without_reading_tags() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::default(),
        RecordingHost::default(),
    );

    let outcome = harness
        .pipeline
        .run(&TriggerEvent::push("refs/heads/release-test"))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Released(ref r) if r.draft && r.tag == "release-test"));

    let requests = harness.host.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].draft);
    assert_eq!(requests[0].body, "Test release");
    assert_eq!(requests[0].assets.len(), 7);
    assert!(harness.tags.fetched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_test_branch_runs_each_create_a_draft() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::default(),
        RecordingHost::default(),
    );
    let event = TriggerEvent::push("refs/heads/release-test");
    harness.pipeline.run(&event).await.unwrap();
    harness.pipeline.run(&event).await.unwrap();
    assert_eq!(harness.host.publish_count(), 2);
}

#[tokio::test]
async fn pull_request_does_nothing() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v2.3.0", SIGNED_ANNOTATION),
        RecordingHost::default(),
    );

    let outcome = harness
        .pipeline
        .run(&TriggerEvent::pull_request("refs/tags/v2.3.0"))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert_eq!(harness.toolchain.call_count(), 0);
    assert_eq!(harness.host.publish_count(), 0);
    assert!(harness.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unmatched_branch_is_skipped() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::default(),
        RecordingHost::default(),
    );
    let outcome = harness
        .pipeline
        .run(&TriggerEvent::push("refs/heads/main"))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { ref reference } if reference == "refs/heads/main"));
    assert_eq!(harness.toolchain.call_count(), 0);
}

#[tokio::test]
async fn failed_target_is_named_and_nothing_is_published() {
    let harness = Harness::new(
        FakeToolchain::failing("x86_64-unknown-freebsd", "error: linker `cc` not found"),
        FakeTags::with("v2.3.0", SIGNED_ANNOTATION),
        RecordingHost::default(),
    );

    let err = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v2.3.0"))
        .await
        .unwrap_err();

    let ReleaseError::MatrixFailed(report) = &err else {
        panic!("expected matrix failure, got {err:?}");
    };
    assert_eq!(report.total, 7);
    assert_eq!(report.failed_targets(), vec!["x86_64-unknown-freebsd"]);
    assert!(report.failures[0].cause.contains("linker `cc` not found"));
    assert_eq!(err.exit_code(), 1);

    // Every cell still ran; only publishing was suppressed
    assert_eq!(harness.toolchain.call_count(), 7);
    assert_eq!(harness.host.publish_count(), 0);
    assert!(harness.tags.fetched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tag_with_slash_is_refused_before_building() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v1/foo", "Notes"),
        RecordingHost::default(),
    );

    let err = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v1/foo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::Trigger(_)), "{err:?}");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.toolchain.call_count(), 0);
    assert_eq!(harness.host.publish_count(), 0);
}

#[tokio::test]
async fn existing_release_is_a_conflict() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v2.3.0", "Notes"),
        RecordingHost {
            existing_tags: vec!["v2.3.0".into()],
            ..Default::default()
        },
    );
    let err = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v2.3.0"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::PublishConflict { ref tag } if tag == "v2.3.0"));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn lightweight_tag_fails_after_build() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::default(),
        RecordingHost::default(),
    );
    let err = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v3.0.0"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::TagFetch(_)));
    assert_eq!(harness.host.publish_count(), 0);
}

#[tokio::test]
async fn prerelease_tags_are_flagged() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v3.0.0-rc.1", "Release candidate"),
        RecordingHost::default(),
    );
    let outcome = harness
        .pipeline
        .run(&TriggerEvent::push("refs/tags/v3.0.0-rc.1"))
        .await
        .unwrap();
    let RunOutcome::Released(report) = outcome else {
        panic!("expected a release");
    };
    assert!(report.prerelease);
    let requests = harness.host.requests.lock().unwrap();
    assert!(requests[0].prerelease);
}

#[tokio::test]
async fn windows_assets_are_zip_and_others_tar_gz() {
    let harness = Harness::new(
        FakeToolchain::default(),
        FakeTags::with("v2.3.0", "Notes"),
        RecordingHost::default(),
    );
    let artifacts = harness.pipeline.run_matrix("v2.3.0").await.unwrap();
    for artifact in &artifacts {
        let expected = if artifact.target.contains("windows") {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        };
        assert_eq!(artifact.format, expected, "{}", artifact.name);
        assert!(artifact.name.ends_with(expected.extension()));
        assert_eq!(artifact.sha256.len(), 64);
    }
}
