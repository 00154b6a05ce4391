use std::time::Duration;

use anyhow::Context;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(StatusCode),
    #[error("upstream returned invalid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid upstream path '{0}'")]
    Path(String),
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status(s) if *s == StatusCode::NOT_FOUND)
    }
}

/// Thin JSON client for the spending API. Cloning shares the connection pool.
#[derive(Clone)]
pub struct SpendingClient {
    base: Url,
    client: reqwest::Client,
}

impl SpendingClient {
    /// `base_url` must end with '/' so relative paths join under it.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid upstream URL: {}", base_url))?;
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().context("building upstream HTTP client")?;
        Ok(Self { base, client })
    }

    pub fn url_for(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base.join(path).map_err(|_| UpstreamError::Path(path.to_string()))
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, UpstreamError> {
        let url = self.url_for(path)?;
        debug!(target: "publiceye::proxy", "GET {} params={}", url, query.len());
        let resp = self.client.get(url).query(query).send().await?;
        Self::decode(resp).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, UpstreamError> {
        let url = self.url_for(path)?;
        debug!(target: "publiceye::proxy", "POST {}", url);
        let resp = self.client.post(url).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn decode(resp: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(UpstreamError::Decode)
    }
}
