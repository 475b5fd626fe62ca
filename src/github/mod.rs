use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, IF_NONE_MATCH, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::github::model::{Branch, Issue, RepoCommit, Tag};

pub mod model;

const GITHUB_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_PREFIX_LEN: usize = 200;

/// Typed failure modes of the GitHub API boundary. Everything above this
/// layer decides stop-vs-retry by matching on these variants.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found: {url}")]
    NotFound { url: String },
    #[error("unauthorized for {url}; check token")]
    Unauthorized { url: String },
    #[error("forbidden or rate limited for {url}")]
    Forbidden {
        url: String,
        /// Parsed `Retry-After` header, seconds.
        retry_after: Option<u64>,
        /// Parsed `X-RateLimit-Reset` header, unix seconds.
        rate_limit_reset: Option<u64>,
    },
    /// Network-level failure before any HTTP status was produced.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid response body from {url}: {detail}")]
    InvalidResponse { url: String, detail: String },
    /// Any other non-2xx, non-304 status.
    #[error("github error {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// Result of one conditional GET. A 304 is a success with `data = None`.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: Option<T>,
    pub etag: Option<String>,
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED.as_u16()
    }
}

/// Filters for the issues endpoint.
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub sort: &'static str,
    pub direction: &'static str,
    pub state: &'static str,
    pub since: Option<String>,
}

impl IssueQuery {
    /// Newly opened issues: creation order, newest first.
    pub fn open_by_creation() -> Self {
        Self {
            sort: "created",
            direction: "desc",
            state: "open",
            since: None,
        }
    }

    /// Newly closed issues: update order, newest first, optionally bounded
    /// server-side by `since`.
    pub fn closed_by_update(since: Option<String>) -> Self {
        Self {
            sort: "updated",
            direction: "desc",
            state: "closed",
            since,
        }
    }
}

/// The four read endpoints the monitoring engine consumes.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
        branch: Option<&str>,
    ) -> Result<ApiResponse<Vec<RepoCommit>>, ApiError>;

    async fn fetch_branches(
        &self,
        owner: &str,
        repo: &str,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<Branch>>, ApiError>;

    async fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
        query: IssueQuery,
    ) -> Result<ApiResponse<Vec<Issue>>, ApiError>;

    async fn fetch_tags(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<Tag>>, ApiError>;
}

#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(token: Option<&str>) -> Self {
        let base_url = Url::parse(GITHUB_API_BASE).expect("valid default GitHub URL");
        Self::with_base_url(token, base_url)
    }

    pub fn with_base_url(token: Option<&str>, base_url: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("tg-gitwatch/0.1"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
                headers.insert(AUTHORIZATION, value);
            } else {
                warn!("github token contains invalid header characters; sending unauthenticated");
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { http, base_url }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        etag: Option<&str>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse {
                url: path.to_string(),
                detail: format!("bad endpoint path: {e}"),
            })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        let mut request = self.http.get(url.clone());
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let response_etag = header_str(&headers, "etag");

        if status == StatusCode::NOT_MODIFIED {
            debug!(%url, "not modified");
            return Ok(ApiResponse {
                status: status.as_u16(),
                data: None,
                etag: response_etag,
                headers,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                url: url.to_string(),
            });
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized {
                url: url.to_string(),
            });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden {
                url: url.to_string(),
                retry_after: header_u64(&headers, "retry-after"),
                rate_limit_reset: header_u64(&headers, "x-ratelimit-reset"),
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            let prefix: String = body.chars().take(BODY_PREFIX_LEN).collect();
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: prefix,
            });
        }

        let data: T = serde_json::from_str(&body).map_err(|e| {
            warn!(%url, error = %e, "failed to decode payload");
            ApiError::InvalidResponse {
                url: url.to_string(),
                detail: e.to_string(),
            }
        })?;

        Ok(ApiResponse {
            status: status.as_u16(),
            data: Some(data),
            etag: response_etag,
            headers,
        })
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
        branch: Option<&str>,
    ) -> Result<ApiResponse<Vec<RepoCommit>>, ApiError> {
        let mut params = vec![("per_page", per_page.to_string())];
        if let Some(branch) = branch {
            params.push(("sha", branch.to_string()));
        }
        self.get_json(&format!("/repos/{owner}/{repo}/commits"), &params, etag)
            .await
    }

    async fn fetch_branches(
        &self,
        owner: &str,
        repo: &str,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<Branch>>, ApiError> {
        let params = vec![("per_page", per_page.to_string())];
        self.get_json(&format!("/repos/{owner}/{repo}/branches"), &params, None)
            .await
    }

    async fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
        query: IssueQuery,
    ) -> Result<ApiResponse<Vec<Issue>>, ApiError> {
        let mut params = vec![
            ("per_page", per_page.to_string()),
            ("sort", query.sort.to_string()),
            ("direction", query.direction.to_string()),
            ("state", query.state.to_string()),
        ];
        if let Some(since) = &query.since {
            params.push(("since", since.clone()));
        }
        self.get_json(&format!("/repos/{owner}/{repo}/issues"), &params, etag)
            .await
    }

    async fn fetch_tags(
        &self,
        owner: &str,
        repo: &str,
        etag: Option<&str>,
        per_page: u32,
    ) -> Result<ApiResponse<Vec<Tag>>, ApiError> {
        let params = vec![("per_page", per_page.to_string())];
        self.get_json(&format!("/repos/{owner}/{repo}/tags"), &params, etag)
            .await
    }
}
