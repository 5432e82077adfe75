//! Zoho WorkDrive client: lists the scanned-invoice folder.
//!
//! WorkDrive speaks JSON:API; listing a folder takes two hops: fetch
//! the folder, then follow `relationships.files.links.related`.

use super::token::{TokenManager, ZohoCredentials};
use super::{FileStorageProvider, ProviderError};
use crate::config::ZohoWorkDriveConfig;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::instrument;

const JSON_API_ACCEPT: &str = "application/vnd.api+json";

pub struct ZohoWorkDriveProvider {
    http: reqwest::Client,
    api_base_url: String,
    tokens: TokenManager,
}

impl ZohoWorkDriveProvider {
    pub fn new(config: &ZohoWorkDriveConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("http client: {}", e)))?;

        let tokens = TokenManager::new(
            ZohoCredentials {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                refresh_token: config.refresh_token.clone(),
                token_url: config.token_url.clone(),
            },
            http.clone(),
        );

        Ok(Self {
            http,
            api_base_url: config.api_base_url.clone(),
            tokens,
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ProviderError> {
        let mut token = self.tokens.current().await?;

        let mut response = self
            .http
            .get(url)
            .header(ACCEPT, JSON_API_ACCEPT)
            .header(AUTHORIZATION, format!("Zoho-oauthtoken {}", token))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("WorkDrive request failed: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("WorkDrive token rejected (401), refreshing and retrying");
            token = self.tokens.refresh().await?;
            response = self
                .http
                .get(url)
                .header(ACCEPT, JSON_API_ACCEPT)
                .header(AUTHORIZATION, format!("Zoho-oauthtoken {}", token))
                .send()
                .await
                .map_err(|e| {
                    ProviderError::Unavailable(format!("WorkDrive request failed: {}", e))
                })?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "WorkDrive answered {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("WorkDrive body: {}", e)))?;

        if body.get("errors").map(|e| !e.is_null()).unwrap_or(false) {
            return Err(ProviderError::InvalidResponse(format!(
                "WorkDrive errors: {}",
                body["errors"]
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl FileStorageProvider for ZohoWorkDriveProvider {
    #[instrument(skip(self))]
    async fn list_files(&self, folder_id: &str) -> Result<Vec<String>, ProviderError> {
        let folder_url = format!("{}/files/{}", self.api_base_url, folder_id);
        let folder = self.get_json(&folder_url).await?;

        let related_url = folder
            .pointer("/data/relationships/files/links/related")
            .and_then(|v| v.as_str());

        let related_url = match related_url {
            Some(url) => url.to_string(),
            // A folder with no files relationship has nothing to list.
            None => return Ok(Vec::new()),
        };

        let listing = self.get_json(&related_url).await?;
        let entries = listing
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        let mut names = Vec::new();
        for entry in entries {
            let attributes = &entry["attributes"];
            if attributes["is_folder"].as_bool().unwrap_or(false) {
                continue;
            }
            if let Some(name) = attributes["name"].as_str() {
                names.push(name.to_string());
            }
        }

        tracing::info!(folder_id = %folder_id, count = names.len(), "Listed WorkDrive folder");
        Ok(names)
    }
}
