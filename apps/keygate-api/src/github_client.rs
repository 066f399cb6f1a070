use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use keygate_core::{DocumentStore, Revision, StoreError, VersionedDocument};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Keys document kept in a GitHub repository, versioned by blob sha.
#[derive(Clone)]
pub struct GitHubStore {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: String,
}

#[derive(Deserialize)]
struct ContentsFile {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResult {
    content: CommittedFile,
}

#[derive(Deserialize)]
struct CommittedFile {
    sha: String,
}

impl GitHubStore {
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        branch: Option<String>,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // reqwest is built without a bundled provider; an Err means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder()
            .user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.filter(|b| !b.trim().is_empty()),
            token: token.to_string(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }
}

fn unavailable(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

async fn status_error(action: &str, response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::Unavailable(format!("{} failed with {}: {}", action, status, body.trim()))
}

#[async_trait]
impl DocumentStore for GitHubStore {
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, StoreError> {
        let mut url = self.contents_url(path);
        if let Some(branch) = &self.branch {
            url = format!("{}?ref={}", url, urlencoding::encode(branch));
        }

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!("{} does not exist yet", path);
                return Ok(None);
            }
            status if !status.is_success() => return Err(status_error("fetch", response).await),
            _ => {}
        }

        let file: ContentsFile = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let encoded: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| StoreError::Malformed(format!("invalid base64 content: {}", e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| StoreError::Malformed(format!("content is not UTF-8: {}", e)))?;

        Ok(Some(VersionedDocument {
            content,
            revision: Revision::new(file.sha),
        }))
    }

    async fn replace(
        &self,
        path: &str,
        content: &str,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let body = PutContents {
            message,
            content: STANDARD.encode(content),
            sha: expected.map(Revision::as_str),
            branch: self.branch.as_deref(),
        };

        let response = self
            .authorized(self.client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::CONFLICT => return Err(StoreError::Conflict),
            // Without a sha GitHub answers 422 when the file appeared meanwhile.
            StatusCode::UNPROCESSABLE_ENTITY if expected.is_none() => {
                return Err(StoreError::Conflict);
            }
            status if !status.is_success() => return Err(status_error("update", response).await),
            _ => {}
        }

        let result: PutResult = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        tracing::debug!("Committed {} at {}", path, result.content.sha);
        Ok(Revision::new(result.content.sha))
    }
}
