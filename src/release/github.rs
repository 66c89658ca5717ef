//! GitHub Releases binding for [`ReleaseHost`].
//!
//! Publishing is staged so a half-populated release is never visible: the
//! release is created as a draft, every asset is uploaded, and only then is a
//! real release flipped to published. If an upload fails the draft is deleted.

use crate::error::PublishError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Opaque API bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wraps a token; blank input yields `None`
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        (!trimmed.is_empty()).then(|| Token(trimmed.to_string()))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// One asset to attach
#[derive(Clone, Debug)]
pub struct AssetUpload {
    /// Asset file name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Archive bytes
    pub content: Bytes,
}

/// Everything needed to publish one release
#[derive(Clone, Debug)]
pub struct ReleaseRequest {
    /// Tag the release is attached to
    pub tag: String,
    /// Display name
    pub name: String,
    /// Release notes
    pub body: String,
    /// Leave the release as a draft
    pub draft: bool,
    /// Mark as pre-release
    pub prerelease: bool,
    /// Assets in attachment order
    pub assets: Vec<AssetUpload>,
}

/// A release as the hosting service reports it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishedRelease {
    /// Service-side identifier
    pub id: u64,
    /// Web URL of the release
    pub url: String,
    /// Whether it is still a draft
    pub draft: bool,
    /// Names of the attached assets in upload order
    pub assets: Vec<String>,
}

/// A service that hosts releases.
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Creates the release and attaches every asset
    async fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError>;
}

#[derive(Deserialize)]
struct ReleaseResponse {
    id: u64,
    html_url: String,
    upload_url: String,
    #[serde(default)]
    draft: bool,
}

#[derive(Deserialize)]
struct AssetResponse {
    name: String,
}

#[derive(Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Serialize)]
struct UpdateRelease {
    draft: bool,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: String,
}

/// Maps an unsuccessful API response to a [`PublishError`].
///
/// A `422` whose error list contains `already_exists` means the tag already
/// carries a release.
pub fn classify_error(status: u16, tag: &str, body: &str) -> PublishError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    if status == StatusCode::UNPROCESSABLE_ENTITY.as_u16()
        && parsed.errors.iter().any(|e| e.code == "already_exists")
    {
        return PublishError::Conflict {
            tag: tag.to_string(),
        };
    }
    let message = if parsed.message.is_empty() {
        body.trim().chars().take(200).collect()
    } else {
        parsed.message
    };
    PublishError::Api { status, message }
}

/// Turns the `upload_url` URI template of a release into a concrete URL
pub fn upload_endpoint(template: &str, asset: &str) -> Result<Url, PublishError> {
    let base = template.split('{').next().unwrap_or(template);
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("name", asset);
    Ok(url)
}

/// GitHub REST API client for one repository.
#[derive(Clone)]
pub struct GithubReleases {
    client: reqwest::Client,
    api_base: Url,
    uploads_base: Option<Url>,
    owner: String,
    repo: String,
}

impl GithubReleases {
    /// Client for `owner/repo` at `api_url`
    pub fn new(
        api_url: &str,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: &Token,
    ) -> Result<Self, PublishError> {
        let api_base = Url::parse(api_url)?;
        if api_base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
            PublishError::Api {
                status: 0,
                message: "token contains characters not allowed in a header".to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base,
            uploads_base: None,
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    /// Uploads go to `uploads_url` instead of the URL the API returns
    pub fn with_uploads_url(mut self, uploads_url: &str) -> Result<Self, PublishError> {
        let url = Url::parse(uploads_url)?;
        if url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        self.uploads_base = Some(url);
        Ok(self)
    }

    /// `<base>/repos/<owner>/<repo>/releases/<segments...>`
    pub fn releases_endpoint(&self, segments: &[&str]) -> Url {
        releases_url(&self.api_base, &self.owner, &self.repo, segments)
    }

    fn asset_endpoint(&self, release: &ReleaseResponse, asset: &str) -> Result<Url, PublishError> {
        match &self.uploads_base {
            Some(base) => {
                let id = release.id.to_string();
                let mut url = releases_url(base, &self.owner, &self.repo, &[&id, "assets"]);
                url.query_pairs_mut().append_pair("name", asset);
                Ok(url)
            }
            None => upload_endpoint(&release.upload_url, asset),
        }
    }

    async fn check_response(
        response: reqwest::Response,
        tag: &str,
    ) -> Result<reqwest::Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status, tag, &body))
    }

    async fn existing_release(&self, tag: &str) -> Result<bool, PublishError> {
        let response = self
            .client
            .get(self.releases_endpoint(&["tags", tag]))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Self::check_response(response, tag).await.map(|_| false),
        }
    }

    async fn create_draft(&self, request: &ReleaseRequest) -> Result<ReleaseResponse, PublishError> {
        let response = self
            .client
            .post(self.releases_endpoint(&[]))
            .json(&CreateRelease {
                tag_name: &request.tag,
                name: &request.name,
                body: &request.body,
                draft: true,
                prerelease: request.prerelease,
            })
            .send()
            .await?;
        let response = Self::check_response(response, &request.tag).await?;
        Ok(response.json().await?)
    }

    async fn upload(
        &self,
        release: &ReleaseResponse,
        asset: &AssetUpload,
        tag: &str,
    ) -> Result<String, PublishError> {
        let url = self.asset_endpoint(release, &asset.name)?;
        log::debug!("Uploading {} ({} bytes)", asset.name, asset.content.len());
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, asset.content_type.as_str())
            .body(asset.content.clone())
            .send()
            .await?;
        let response = Self::check_response(response, tag).await?;
        let uploaded: AssetResponse = response.json().await?;
        Ok(uploaded.name)
    }

    async fn upload_all(
        &self,
        release: &ReleaseResponse,
        request: &ReleaseRequest,
    ) -> Result<Vec<String>, PublishError> {
        let mut names = Vec::with_capacity(request.assets.len());
        for asset in &request.assets {
            let name = self
                .upload(release, asset, &request.tag)
                .await
                .map_err(|e| PublishError::Asset {
                    name: asset.name.clone(),
                    reason: e.to_string(),
                })?;
            names.push(name);
        }
        Ok(names)
    }

    async fn finalize(&self, release: &ReleaseResponse, tag: &str) -> Result<ReleaseResponse, PublishError> {
        let id = release.id.to_string();
        let response = self
            .client
            .patch(self.releases_endpoint(&[&id]))
            .json(&UpdateRelease { draft: false })
            .send()
            .await?;
        let response = Self::check_response(response, tag).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, release: &ReleaseResponse) {
        let id = release.id.to_string();
        match self.client.delete(self.releases_endpoint(&[&id])).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("Deleted incomplete draft release {}", release.id);
            }
            Ok(response) => {
                log::warn!(
                    "Failed to delete incomplete draft release {}: HTTP {}",
                    release.id,
                    response.status()
                );
            }
            Err(e) => log::warn!("Failed to delete incomplete draft release {}: {}", release.id, e),
        }
    }
}

fn releases_url(base: &Url, owner: &str, repo: &str, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Bases are checked with cannot_be_a_base() on construction
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty()
            .extend(["repos", owner, repo, "releases"])
            .extend(segments);
    }
    url
}

#[async_trait]
impl ReleaseHost for GithubReleases {
    async fn publish(&self, request: &ReleaseRequest) -> Result<PublishedRelease, PublishError> {
        if !request.draft && self.existing_release(&request.tag).await? {
            return Err(PublishError::Conflict {
                tag: request.tag.clone(),
            });
        }

        let draft = self.create_draft(request).await?;
        log::info!(
            "Created draft release {} for {} in {}/{}",
            draft.id,
            request.tag,
            self.owner,
            self.repo
        );

        let assets = match self.upload_all(&draft, request).await {
            Ok(assets) => assets,
            Err(e) => {
                self.delete(&draft).await;
                return Err(e);
            }
        };

        let release = if request.draft {
            draft
        } else {
            match self.finalize(&draft, &request.tag).await {
                Ok(release) => release,
                Err(e) => {
                    self.delete(&draft).await;
                    return Err(e);
                }
            }
        };

        Ok(PublishedRelease {
            id: release.id,
            url: release.html_url,
            draft: release.draft,
            assets,
        })
    }
}

impl fmt::Debug for GithubReleases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubReleases")
            .field("api_base", &self.api_base.as_str())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api: &str) -> GithubReleases {
        GithubReleases::new(api, "acme", "webhook", &Token::new("ghp_secret").unwrap()).unwrap()
    }

    #[test]
    fn already_exists_is_conflict() {
        let body = r#"{"message":"Validation Failed","errors":[{"resource":"Release","code":"already_exists","field":"tag_name"}]}"#;
        assert!(matches!(
            classify_error(422, "v2.3.0", body),
            PublishError::Conflict { ref tag } if tag == "v2.3.0"
        ));
    }

    #[test]
    fn other_validation_errors_keep_message() {
        let body = r#"{"message":"Validation Failed","errors":[{"code":"invalid"}]}"#;
        match classify_error(422, "v2.3.0", body) {
            PublishError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Validation Failed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_reported_verbatim() {
        match classify_error(502, "v1", "Bad gateway\n") {
            PublishError::Api { message, .. } => assert_eq!(message, "Bad gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_template_is_expanded() {
        let url = upload_endpoint(
            "https://uploads.github.com/repos/acme/webhook/releases/42/assets{?name,label}",
            "app-v1.0.0-x86_64-pc-windows-msvc.zip",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://uploads.github.com/repos/acme/webhook/releases/42/assets?name=app-v1.0.0-x86_64-pc-windows-msvc.zip"
        );
    }

    #[test]
    fn endpoints_are_built_under_the_base_path() {
        let github = client("https://api.github.com");
        assert_eq!(
            github.releases_endpoint(&["tags", "v2.3.0"]).as_str(),
            "https://api.github.com/repos/acme/webhook/releases/tags/v2.3.0"
        );

        let enterprise = client("https://ghe.example.com/api/v3/");
        assert_eq!(
            enterprise.releases_endpoint(&[]).as_str(),
            "https://ghe.example.com/api/v3/repos/acme/webhook/releases"
        );
    }

    #[test]
    fn configured_uploads_base_is_used() {
        let github = client("https://ghe.example.com/api/v3")
            .with_uploads_url("https://ghe.example.com/api/uploads")
            .unwrap();
        let release = ReleaseResponse {
            id: 7,
            html_url: String::new(),
            upload_url: "https://ignored.example.com/{?name}".to_string(),
            draft: true,
        };
        assert_eq!(
            github.asset_endpoint(&release, "a.zip").unwrap().as_str(),
            "https://ghe.example.com/api/uploads/repos/acme/webhook/releases/7/assets?name=a.zip"
        );
    }

    #[test]
    fn token_is_redacted() {
        let token = Token::new("  ghp_secret \n").unwrap();
        assert_eq!(format!("{token:?}"), "Token(***)");
        assert!(Token::new("   ").is_none());
        assert!(!format!("{:?}", client("https://api.github.com")).contains("ghp_secret"));
    }

    #[test]
    fn relative_api_url_is_rejected() {
        let err = GithubReleases::new("not a url", "a", "b", &Token::new("t").unwrap()).unwrap_err();
        assert!(matches!(err, PublishError::InvalidUrl(_)));
    }
}
