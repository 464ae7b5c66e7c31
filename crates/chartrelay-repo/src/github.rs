//! GitHub client
//!
//! One authenticated HTTP client serving the REST release API, the issue
//! search used for release notes and the GraphQL signed-commit mutation.

use async_trait::async_trait;
use chartrelay_core::{Chart, IssueRef, PipelineConfig};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::{Credentials, ResolvedCredentials};
use crate::error::{RepoError, Result};
use crate::graphql::{
    CREATE_COMMIT_MUTATION, CommitApi, CommitInfo, CreateCommitData, CreateCommitOnBranchInput,
    GraphQlRequest, GraphQlResponse, InputVariables,
};
use crate::issues::IssueTracker;
use crate::releases::{NewRelease, Release, ReleaseApi, ReleaseAsset};

const PAGE_SIZE: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// Authenticated GitHub client scoped to one repository
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    uploads_url: Url,
    graphql_url: Url,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Deserialize)]
struct IssueItem {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl GitHubClient {
    /// Create a client for the configured repository
    pub fn new(config: &PipelineConfig, credentials: Option<ResolvedCredentials>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(creds) = credentials {
            let mut value = HeaderValue::from_str(&creds.auth_header()).map_err(|e| {
                RepoError::AuthFailed {
                    message: format!("invalid token: {}", e),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("chartrelay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.github.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: parse_url(&config.github.api_url)?,
            uploads_url: parse_url(&config.github.uploads_url)?,
            graphql_url: parse_url(&config.github.graphql_url)?,
            owner: config.repository.owner.clone(),
            repo: config.repository.name.clone(),
        })
    }

    /// Create a client authenticated with the token named in configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let credentials = Credentials::github(config).resolve()?;
        Self::new(config, Some(credentials))
    }

    /// `<base>/repos/<owner>/<repo>/<segments...>` with each segment escaped
    fn repo_endpoint(&self, base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| RepoError::InvalidUrl {
                url: base.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn api_endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| RepoError::InvalidUrl {
                url: self.api_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Delete a container package at `url`; `Ok(false)` when it does not exist
    async fn delete_package_at(&self, url: Url) -> Result<bool> {
        let response = self.http.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| RepoError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Turn non-2xx responses into errors carrying the API message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .unwrap_or(body);

    if status == StatusCode::UNAUTHORIZED {
        return Err(RepoError::AuthFailed { message });
    }
    Err(RepoError::HttpError {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ReleaseApi for GitHubClient {
    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>> {
        let url = self.repo_endpoint(&self.api_url, &["releases", "tags", tag])?;
        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(check(response).await?.json().await?))
    }

    async fn list_releases(&self) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        let mut page = 1usize;

        loop {
            let mut url = self.repo_endpoint(&self.api_url, &["releases"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<Release> = check(self.http.get(url).send().await?)
                .await?
                .json()
                .await?;
            let count = batch.len();
            releases.extend(batch);

            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(count = releases.len(), "listed releases");
        Ok(releases)
    }

    async fn create_release(&self, release: &NewRelease) -> Result<Release> {
        let url = self.repo_endpoint(&self.api_url, &["releases"])?;
        let response = self.http.post(url).json(release).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn upload_asset(
        &self,
        release: &Release,
        file_name: &str,
        label: &str,
        data: Vec<u8>,
    ) -> Result<ReleaseAsset> {
        let id = release.id.to_string();
        let mut url = self.repo_endpoint(&self.uploads_url, &["releases", &id, "assets"])?;
        url.query_pairs_mut()
            .append_pair("name", file_name)
            .append_pair("label", label);

        let content_type = if file_name.ends_with(".tgz") {
            "application/gzip"
        } else {
            "application/octet-stream"
        };

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        let url = parse_url(&asset.url)?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    async fn delete_release(&self, release: &Release) -> Result<()> {
        let id = release.id.to_string();
        let url = self.repo_endpoint(&self.api_url, &["releases", &id])?;
        let response = self.http.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        let url = self.repo_endpoint(&self.api_url, &["git", "refs", "tags", tag])?;
        let response = self.http.delete(url).send().await?;
        // 422 is "Reference does not exist"
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn delete_package(&self, package: &str) -> Result<()> {
        let org_url = self.api_endpoint(&[
            "orgs",
            self.owner.as_str(),
            "packages",
            "container",
            package,
        ])?;
        if self.delete_package_at(org_url).await? {
            return Ok(());
        }

        // Repositories owned by a user account
        let user_url = self.api_endpoint(&["user", "packages", "container", package])?;
        if !self.delete_package_at(user_url).await? {
            debug!(package, "package not found, nothing to delete");
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn closed_issues(&self, chart: &Chart) -> Vec<IssueRef> {
        let fetch = async {
            let mut url = self.repo_endpoint(&self.api_url, &["issues"])?;
            url.query_pairs_mut()
                .append_pair("state", "closed")
                .append_pair("labels", &chart.name)
                .append_pair("per_page", &PAGE_SIZE.to_string());
            let items: Vec<IssueItem> = check(self.http.get(url).send().await?)
                .await?
                .json()
                .await?;
            Ok::<_, RepoError>(items)
        };

        match fetch.await {
            Ok(items) => items
                .into_iter()
                .filter(|i| i.pull_request.is_none())
                .map(|i| IssueRef {
                    number: i.number,
                    title: i.title,
                    url: i.html_url,
                })
                .collect(),
            Err(e) => {
                warn!(chart = %chart.name, error = %e, "cannot fetch closed issues");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CommitApi for GitHubClient {
    async fn create_commit_on_branch(
        &self,
        input: &CreateCommitOnBranchInput,
    ) -> Result<CommitInfo> {
        let request = GraphQlRequest {
            query: CREATE_COMMIT_MUTATION,
            variables: InputVariables { input },
        };

        let response = self
            .http
            .post(self.graphql_url.clone())
            .json(&request)
            .send()
            .await?;
        let body: GraphQlResponse<CreateCommitData> = check(response).await?.json().await?;
        body.into_commit()
    }
}
