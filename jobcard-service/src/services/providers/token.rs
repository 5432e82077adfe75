//! Zoho OAuth access-token cache.
//!
//! Access tokens are minted from a long-lived refresh token and cached
//! until shortly before expiry; Books and WorkDrive each hold their own
//! manager because their credentials differ.

use super::ProviderError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Refresh expires_in this much early so a token is never used at the
/// edge of its lifetime.
const EXPIRY_SKEW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ZohoCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

pub struct TokenManager {
    credentials: ZohoCredentials,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(credentials: ZohoCredentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            cached: RwLock::new(None),
        }
    }

    /// Return a valid access token, refreshing when the cached one is
    /// missing or within the expiry skew.
    pub async fn current(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }
        self.refresh().await
    }

    /// Force-mint a new access token from the refresh token.
    pub async fn refresh(&self) -> Result<String, ProviderError> {
        tracing::info!(token_url = %self.credentials.token_url, "Refreshing Zoho access token");

        let response = self
            .http
            .post(&self.credentials.token_url)
            .query(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Authentication(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("token response: {}", e)))?;

        let access_token = body.access_token.ok_or_else(|| {
            ProviderError::Authentication("no access token in token response".to_string())
        })?;

        let expires_in = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + expires_in.saturating_sub(EXPIRY_SKEW);

        *self.cached.write().await = Some(CachedToken {
            value: access_token.clone(),
            expires_at,
        });

        tracing::info!(expires_in_secs = expires_in.as_secs(), "Zoho access token updated");
        Ok(access_token)
    }
}
