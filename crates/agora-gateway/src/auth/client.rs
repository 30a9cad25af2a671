use anyhow::{Context, Result};
use serde::Deserialize;

/// A fresh access token from the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Client for the external auth service.
///
/// Only the refresh endpoint is used here; login and registration stay on
/// the auth service's own surface.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Exchange a still-valid token for a fresh one.
    pub async fn refresh(&self, token: &str) -> Result<RefreshedToken> {
        let url = format!("{}/refresh", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("auth service unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("auth service refused refresh: {}", response.status());
        }

        response
            .json::<RefreshedToken>()
            .await
            .context("malformed refresh response")
    }

    /// Cheap reachability probe for health checks.
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("auth service unhealthy: {}", response.status());
        }
        Ok(())
    }
}
