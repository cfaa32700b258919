//! GitHub Contents API Backend
//!
//! Talks to `GET/PUT/DELETE /repos/{owner}/{repo}/contents/{path}` over
//! HTTPS using `reqwest`.
//!
//! Supports:
//! - github.com and GitHub Enterprise (`api_base`)
//! - anonymous reads (public repositories)
//! - `token` authorization for writes and deletes

use crate::backend::{
    ApiError, ApiFuture, ContentApi, ContentEntry, DeleteFileRequest, PutFileRequest,
};
use crate::config::GitHubConfig;
use crate::store::Credential;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

const ACCEPT_JSON: &str = "application/vnd.github.v3+json";

/// Contents API client for one repository
#[derive(Clone)]
pub struct GitHubContentsApi {
    client: Client,
    config: GitHubConfig,
}

impl std::fmt::Debug for GitHubContentsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubContentsApi")
            .field("api_base", &self.config.api_base)
            .field("owner", &self.config.owner)
            .field("repo", &self.config.repo)
            .field("branch", &self.config.branch)
            .finish()
    }
}

impl GitHubContentsApi {
    /// Build a client with default headers and the configured timeout
    pub fn new(config: GitHubConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone());
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(GitHubContentsApi { client, config })
    }

    /// Use an existing client (shared connection pool)
    pub fn with_client(client: Client, config: GitHubConfig) -> Self {
        GitHubContentsApi { client, config }
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// Contents endpoint for a path
    pub fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            path.trim_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str, credential: Option<&Credential>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(USER_AGENT, self.config.user_agent.as_str());
        if let Some(credential) = credential {
            builder = builder.header(AUTHORIZATION, authorization_value(credential));
        }
        builder
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    /// Return the body on success, or the mapped error
    async fn read_body(response: Response) -> Result<Vec<u8>, ApiError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ApiError::from_status(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ))
        }
    }

    fn json_body<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ApiError> {
        serde_json::to_vec(value).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn authorization_value(credential: &Credential) -> String {
    format!("token {}", credential.expose())
}

/// Body of a successful create/update response
#[derive(serde::Deserialize)]
struct PutFileResponse {
    content: ContentEntry,
}

impl ContentApi for GitHubContentsApi {
    fn list_dir<'a>(
        &'a self,
        path: &'a str,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<ContentEntry>> {
        Box::pin(async move {
            let url = self.contents_url(path);
            debug!(%url, "listing directory");
            let builder = self
                .request(Method::GET, &url, credential)
                .query(&[("ref", self.config.branch.as_str())]);
            let body = Self::read_body(Self::send(builder).await?).await?;

            // A file path returns a single object rather than an array
            serde_json::from_slice::<Vec<ContentEntry>>(&body)
                .map_err(|e| ApiError::Decode(format!("{} is not a directory listing: {}", path, e)))
        })
    }

    fn fetch_raw<'a>(
        &'a self,
        entry: &'a ContentEntry,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let builder = match &entry.download_url {
                // Raw host; the token is only sent to the API origin
                Some(url) => self
                    .client
                    .get(url.as_str())
                    .header(USER_AGENT, self.config.user_agent.as_str()),
                None => self
                    .request(Method::GET, &self.contents_url(&entry.path), credential)
                    .header(ACCEPT, "application/vnd.github.raw")
                    .query(&[("ref", self.config.branch.as_str())]),
            };
            debug!(path = %entry.path, "fetching content");
            Self::read_body(Self::send(builder).await?).await
        })
    }

    fn put_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a PutFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ContentEntry> {
        Box::pin(async move {
            let url = self.contents_url(path);
            debug!(%url, "writing file");
            let builder = self
                .request(Method::PUT, &url, Some(credential))
                .header(CONTENT_TYPE, "application/json")
                .body(Self::json_body(request)?);
            let body = Self::read_body(Self::send(builder).await?).await?;
            let response: PutFileResponse =
                serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
            Ok(response.content)
        })
    }

    fn delete_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a DeleteFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.contents_url(path);
            debug!(%url, "deleting file");
            let builder = self
                .request(Method::DELETE, &url, Some(credential))
                .header(CONTENT_TYPE, "application/json")
                .body(Self::json_body(request)?);
            Self::read_body(Self::send(builder).await?).await?;
            Ok(())
        })
    }
}
