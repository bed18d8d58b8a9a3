//! GitHub REST API: releases, release assets and deployments.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://api.github.com";
const UPLOADS_BASE: &str = "https://uploads.github.com";
/// Only the first page of releases is scanned for drafts.
const RELEASES_PAGE_SIZE: u32 = 100;
const USER_AGENT: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

/// State GitHub reports for a fully uploaded asset.
pub const ASSET_UPLOADED: &str = "uploaded";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub state: String,
}

impl ReleaseAsset {
    pub fn is_uploaded(&self) -> bool {
        self.state == ASSET_UPLOADED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDeployment {
    #[serde(rename = "ref")]
    pub reference: String,
    pub environment: String,
    pub description: String,
    pub auto_merge: bool,
    pub required_contexts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Deployment {
    pub id: u64,
    pub sha: String,
    pub environment: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("GitHub request to {url} failed")]
    Request { url: String, source: reqwest::Error },

    #[error("GitHub returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// The subset of the GitHub API ferry needs.
///
/// Production code uses [`GithubClient`], tests use mockall-generated mocks.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Published release for `tag`, or `None` when no such release exists.
    ///
    /// Drafts are invisible to this lookup; see [`GithubApi::list_releases`].
    async fn get_release_by_tag(
        &self,
        org: &str,
        project: &str,
        tag: &str,
    ) -> Result<Option<Release>, GithubError>;

    /// Most recent releases, drafts included.
    async fn list_releases(&self, org: &str, project: &str) -> Result<Vec<Release>, GithubError>;

    async fn create_release(
        &self,
        org: &str,
        project: &str,
        release: &NewRelease,
    ) -> Result<Release, GithubError>;

    async fn upload_release_asset(
        &self,
        org: &str,
        project: &str,
        release_id: u64,
        name: &str,
        content: Vec<u8>,
    ) -> Result<ReleaseAsset, GithubError>;

    async fn delete_release_asset(
        &self,
        org: &str,
        project: &str,
        asset_id: u64,
    ) -> Result<(), GithubError>;

    async fn create_deployment(
        &self,
        org: &str,
        project: &str,
        deployment: &NewDeployment,
    ) -> Result<Deployment, GithubError>;
}

/// GitHub API client authenticated with a token.
pub struct GithubClient {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
    uploads_base: String,
}

impl GithubClient {
    pub fn new(token: SecretString) -> Self {
        Self::with_base_urls(token, API_BASE, UPLOADS_BASE)
    }

    /// Point the client at a GitHub Enterprise instance or a test server.
    pub fn with_base_urls(token: SecretString, api_base: &str, uploads_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            api_base: api_base.trim_end_matches('/').to_owned(),
            uploads_base: uploads_base.trim_end_matches('/').to_owned(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send(
        &self,
        url: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GithubError> {
        tracing::debug!(%url, "github request");
        let response = builder.send().await.map_err(|e| GithubError::Request {
            url: url.to_owned(),
            source: e,
        })?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(response);
        }
        let body = response.text().await.map_err(|e| GithubError::Request {
            url: url.to_owned(),
            source: e,
        })?;
        Err(GithubError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, GithubError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GithubError::Status {
                url: url.to_owned(),
                status: StatusCode::NOT_FOUND.as_u16(),
                body: String::new(),
            });
        }
        response.json().await.map_err(|e| GithubError::Request {
            url: url.to_owned(),
            source: e,
        })
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn get_release_by_tag(
        &self,
        org: &str,
        project: &str,
        tag: &str,
    ) -> Result<Option<Release>, GithubError> {
        let url = format!(
            "{}/repos/{org}/{project}/releases/tags/{tag}",
            self.api_base
        );
        let response = self
            .send(&url, self.request(reqwest::Method::GET, &url))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::json(&url, response).await.map(Some)
    }

    async fn list_releases(&self, org: &str, project: &str) -> Result<Vec<Release>, GithubError> {
        let url = format!(
            "{}/repos/{org}/{project}/releases?per_page={RELEASES_PAGE_SIZE}",
            self.api_base
        );
        let response = self
            .send(&url, self.request(reqwest::Method::GET, &url))
            .await?;
        Self::json(&url, response).await
    }

    async fn create_release(
        &self,
        org: &str,
        project: &str,
        release: &NewRelease,
    ) -> Result<Release, GithubError> {
        let url = format!("{}/repos/{org}/{project}/releases", self.api_base);
        let response = self
            .send(&url, self.request(reqwest::Method::POST, &url).json(release))
            .await?;
        Self::json(&url, response).await
    }

    async fn upload_release_asset(
        &self,
        org: &str,
        project: &str,
        release_id: u64,
        name: &str,
        content: Vec<u8>,
    ) -> Result<ReleaseAsset, GithubError> {
        let url = format!(
            "{}/repos/{org}/{project}/releases/{release_id}/assets",
            self.uploads_base
        );
        let builder = self
            .request(reqwest::Method::POST, &url)
            .query(&[("name", name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content);
        let response = self.send(&url, builder).await?;
        Self::json(&url, response).await
    }

    async fn delete_release_asset(
        &self,
        org: &str,
        project: &str,
        asset_id: u64,
    ) -> Result<(), GithubError> {
        let url = format!(
            "{}/repos/{org}/{project}/releases/assets/{asset_id}",
            self.api_base
        );
        self.send(&url, self.request(reqwest::Method::DELETE, &url))
            .await?;
        Ok(())
    }

    async fn create_deployment(
        &self,
        org: &str,
        project: &str,
        deployment: &NewDeployment,
    ) -> Result<Deployment, GithubError> {
        let url = format!("{}/repos/{org}/{project}/deployments", self.api_base);
        let response = self
            .send(
                &url,
                self.request(reqwest::Method::POST, &url).json(deployment),
            )
            .await?;
        Self::json(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_deserialises_github_payload() {
        let payload = r#"{
            "id": 42,
            "tag_name": "v1.0.0",
            "draft": false,
            "html_url": "https://github.com/acme/widget/releases/tag/v1.0.0",
            "assets": [
                {"id": 7, "name": "widget.tgz", "size": 1024, "state": "uploaded", "label": null}
            ],
            "body": "ignored"
        }"#;
        let release: Release = serde_json::from_str(payload).unwrap();
        assert_eq!(release.id, 42);
        assert_eq!(release.assets.len(), 1);
        assert!(release.assets[0].is_uploaded());
    }

    #[test]
    fn release_list_keeps_drafts() {
        let payload = r#"[
            {"id": 3, "tag_name": "v1.1.0", "draft": true, "html_url": "", "assets": []},
            {"id": 2, "tag_name": "v1.0.0", "draft": false, "html_url": "", "assets": []}
        ]"#;
        let releases: Vec<Release> = serde_json::from_str(payload).unwrap();
        let draft = releases.iter().find(|r| r.tag_name == "v1.1.0").unwrap();
        assert!(draft.draft);
        assert_eq!(draft.id, 3);
    }

    #[test]
    fn deployment_serialises_ref_field() {
        let deployment = NewDeployment {
            reference: "abc123".to_owned(),
            environment: "production".to_owned(),
            description: "ferry deploy".to_owned(),
            auto_merge: false,
            required_contexts: vec![],
        };
        let json = serde_json::to_value(&deployment).unwrap();
        assert_eq!(json["ref"], "abc123");
        assert_eq!(json["environment"], "production");
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn base_urls_drop_trailing_slash() {
        let client = GithubClient::with_base_urls(
            SecretString::from("t"),
            "https://ghe.example.com/api/v3/",
            "https://ghe.example.com/api/uploads/",
        );
        assert_eq!(client.api_base, "https://ghe.example.com/api/v3");
        assert_eq!(client.uploads_base, "https://ghe.example.com/api/uploads");
    }
}
