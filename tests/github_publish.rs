//! GitHub Releases client against a local mock of the REST API.

use bytes::Bytes;
use release_matrix::ReleaseError;
use release_matrix::error::PublishError;
use release_matrix::release::{AssetUpload, GithubReleases, ReleaseHost, ReleaseRequest, Token};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RELEASES: &str = "/repos/acme/webhook/releases";

fn client(server: &MockServer) -> GithubReleases {
    GithubReleases::new(
        &server.uri(),
        "acme",
        "webhook",
        &Token::new("ghp_test").unwrap(),
    )
    .unwrap()
}

fn release_json(server: &MockServer, id: u64, draft: bool) -> Value {
    json!({
        "id": id,
        "html_url": "https://github.com/acme/webhook/releases/tag/v2.3.0",
        "upload_url": format!(
            "{}/uploads/repos/acme/webhook/releases/{id}/assets{{?name,label}}",
            server.uri()
        ),
        "draft": draft,
    })
}

fn asset(name: &str, content_type: &str) -> AssetUpload {
    AssetUpload {
        name: name.to_string(),
        content_type: content_type.to_string(),
        content: Bytes::from(format!("archive {name}")),
    }
}

fn request(draft: bool) -> ReleaseRequest {
    ReleaseRequest {
        tag: "v2.3.0".into(),
        name: "v2.3.0".into(),
        body: "Webhook server 2.3.0".into(),
        draft,
        prerelease: false,
        assets: vec![
            asset("app-v2.3.0-x86_64-unknown-linux-musl.tar.gz", "application/gzip"),
            asset("app-v2.3.0-x86_64-pc-windows-msvc.zip", "application/zip"),
        ],
    }
}

async fn no_existing_release(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{RELEASES}/tags/v2.3.0")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn creates_draft(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(RELEASES))
        .and(header("authorization", "Bearer ghp_test"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(body_partial_json(json!({
            "tag_name": "v2.3.0",
            "body": "Webhook server 2.3.0",
            "draft": true,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(release_json(server, 1, true)))
        .expect(1)
        .mount(server)
        .await;
}

async fn accepts_upload(server: &MockServer, name: &str, content_type: &str) {
    Mock::given(method("POST"))
        .and(path("/uploads/repos/acme/webhook/releases/1/assets"))
        .and(query_param("name", name))
        .and(header("content-type", content_type))
        .and(body_string(format!("archive {name}")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": name})))
        .expect(1)
        .mount(server)
        .await;
}

async fn never(server: &MockServer, verb: &str) {
    Mock::given(method(verb))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn real_release_is_created_as_draft_then_published() {
    let server = MockServer::start().await;
    no_existing_release(&server).await;
    creates_draft(&server).await;
    accepts_upload(&server, "app-v2.3.0-x86_64-unknown-linux-musl.tar.gz", "application/gzip").await;
    accepts_upload(&server, "app-v2.3.0-x86_64-pc-windows-msvc.zip", "application/zip").await;
    Mock::given(method("PATCH"))
        .and(path(format!("{RELEASES}/1")))
        .and(body_partial_json(json!({"draft": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, 1, false)))
        .expect(1)
        .mount(&server)
        .await;
    never(&server, "DELETE").await;

    let published = client(&server).publish(&request(false)).await.unwrap();
    assert_eq!(published.id, 1);
    assert!(!published.draft);
    assert_eq!(published.url, "https://github.com/acme/webhook/releases/tag/v2.3.0");
    assert_eq!(
        published.assets,
        vec![
            "app-v2.3.0-x86_64-unknown-linux-musl.tar.gz",
            "app-v2.3.0-x86_64-pc-windows-msvc.zip",
        ]
    );

    let uploads: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/uploads/"))
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(key, _)| key == "name")
                .map(|(_, value)| value.into_owned())
        })
        .collect();
    assert_eq!(uploads, published.assets);
}

#[tokio::test]
async fn draft_release_skips_existing_check_and_stays_draft() {
    let server = MockServer::start().await;
    creates_draft(&server).await;
    accepts_upload(&server, "app-v2.3.0-x86_64-unknown-linux-musl.tar.gz", "application/gzip").await;
    accepts_upload(&server, "app-v2.3.0-x86_64-pc-windows-msvc.zip", "application/zip").await;
    never(&server, "GET").await;
    never(&server, "PATCH").await;
    never(&server, "DELETE").await;

    let published = client(&server).publish(&request(true)).await.unwrap();
    assert!(published.draft);
    assert_eq!(published.assets.len(), 2);
}

#[tokio::test]
async fn existing_release_is_a_conflict_and_nothing_is_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{RELEASES}/tags/v2.3.0")))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, 9, false)))
        .expect(1)
        .mount(&server)
        .await;
    never(&server, "POST").await;
    never(&server, "PATCH").await;

    let err = client(&server).publish(&request(false)).await.unwrap_err();
    assert!(matches!(err, PublishError::Conflict { ref tag } if tag == "v2.3.0"));

    let err = ReleaseError::from(err);
    assert!(matches!(err, ReleaseError::PublishConflict { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn release_created_concurrently_is_a_conflict() {
    let server = MockServer::start().await;
    no_existing_release(&server).await;
    Mock::given(method("POST"))
        .and(path(RELEASES))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{"resource": "Release", "code": "already_exists", "field": "tag_name"}],
        })))
        .expect(1)
        .mount(&server)
        .await;
    never(&server, "DELETE").await;

    let err = client(&server).publish(&request(false)).await.unwrap_err();
    assert_eq!(ReleaseError::from(err).exit_code(), 3);
}

#[tokio::test]
async fn failed_upload_deletes_the_draft() {
    let server = MockServer::start().await;
    no_existing_release(&server).await;
    creates_draft(&server).await;
    accepts_upload(&server, "app-v2.3.0-x86_64-unknown-linux-musl.tar.gz", "application/gzip").await;
    Mock::given(method("POST"))
        .and(path("/uploads/repos/acme/webhook/releases/1/assets"))
        .and(query_param("name", "app-v2.3.0-x86_64-pc-windows-msvc.zip"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{RELEASES}/1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    never(&server, "PATCH").await;

    let err = client(&server).publish(&request(false)).await.unwrap_err();
    match err {
        PublishError::Asset { name, reason } => {
            assert_eq!(name, "app-v2.3.0-x86_64-pc-windows-msvc.zip");
            assert!(reason.contains("502"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn failed_finalize_deletes_the_draft() {
    let server = MockServer::start().await;
    no_existing_release(&server).await;
    creates_draft(&server).await;
    accepts_upload(&server, "app-v2.3.0-x86_64-unknown-linux-musl.tar.gz", "application/gzip").await;
    accepts_upload(&server, "app-v2.3.0-x86_64-pc-windows-msvc.zip", "application/zip").await;
    Mock::given(method("PATCH"))
        .and(path(format!("{RELEASES}/1")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "Server Error"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{RELEASES}/1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).publish(&request(false)).await.unwrap_err();
    assert!(matches!(err, PublishError::Api { status: 500, .. }), "{err:?}");
}
