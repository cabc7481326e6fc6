use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{RemoteBackup, RemoteBlob};
use crate::config::GithubCredentials;

const API_BASE: &str = "https://api.github.com";

/// History mirror backed by the GitHub contents API: the blob lives as
/// one file in a repository, and its content SHA doubles as the
/// optimistic-concurrency token.
pub struct GithubBackup {
    token: String,
    repo: String,
    branch: String,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    sha: Option<String>,
}

impl GithubBackup {
    pub fn new(creds: GithubCredentials) -> Self {
        Self {
            token: creds.token,
            repo: creds.repo,
            branch: "main".to_string(),
            client: Client::builder()
                .user_agent(concat!("viewtrack/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn contents_url(&self, key: &str) -> String {
        format!("{API_BASE}/repos/{}/contents/{key}", self.repo)
    }

    async fn get_contents(&self, key: &str) -> Result<Option<ContentsResponse>> {
        let rsp = self
            .client
            .get(self.contents_url(key))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .context("github contents get")?;

        if rsp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let rsp = rsp.error_for_status().context("github contents non-2xx")?;
        let body: ContentsResponse = rsp.json().await.context("parsing github contents")?;
        Ok(Some(body))
    }

    async fn put_contents(&self, key: &str, bytes: &[u8], sha: Option<&str>) -> Result<StatusCode> {
        let mut body = serde_json::json!({
            "message": format!("Update history: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")),
            "content": BASE64.encode(bytes),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }

        let rsp = self
            .client
            .put(self.contents_url(key))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await
            .context("github contents put")?;
        Ok(rsp.status())
    }

    async fn current_sha(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_contents(key).await?.and_then(|c| c.sha))
    }
}

#[async_trait::async_trait]
impl RemoteBackup for GithubBackup {
    async fn fetch(&self, key: &str) -> Result<Option<RemoteBlob>> {
        let Some(contents) = self.get_contents(key).await? else {
            return Ok(None);
        };
        let encoded = contents
            .content
            .ok_or_else(|| anyhow!("github contents response without content"))?;
        // The API wraps base64 at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .context("decoding github content")?;
        Ok(Some(RemoteBlob {
            bytes,
            version: contents.sha,
        }))
    }

    async fn store(&self, key: &str, bytes: &[u8], version: Option<&str>) -> Result<()> {
        // Resolve a token if the caller has none (first write, or a load
        // that bypassed the remote).
        let sha = match version {
            Some(v) => Some(v.to_string()),
            None => self.current_sha(key).await?,
        };

        let status = self.put_contents(key, bytes, sha.as_deref()).await?;
        if status.is_success() {
            return Ok(());
        }

        // A stale SHA means someone else committed since our token was
        // issued; one retry with a fresh token, then give up.
        if matches!(status, StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY) {
            tracing::warn!(%status, "github mirror conflict; retrying with fresh sha");
            let fresh = self.current_sha(key).await?;
            let status = self.put_contents(key, bytes, fresh.as_deref()).await?;
            if status.is_success() {
                return Ok(());
            }
            return Err(anyhow!("github mirror retry failed with {status}"));
        }
        Err(anyhow!("github mirror put failed with {status}"))
    }
}
