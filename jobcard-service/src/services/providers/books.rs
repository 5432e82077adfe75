//! Zoho Books client: the accounting provider of record for invoices.

use super::token::{TokenManager, ZohoCredentials};
use super::{AccountingProvider, InvoiceFilter, ProviderError, RemoteInvoice};
use crate::config::ZohoBooksConfig;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::instrument;

pub struct ZohoBooksProvider {
    http: reqwest::Client,
    api_base_url: String,
    organization_id: String,
    tokens: TokenManager,
}

impl ZohoBooksProvider {
    pub fn new(config: &ZohoBooksConfig, timeout: Duration) -> Result<Self, ProviderError> {
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
            organization_id: config.organization_id.clone(),
            tokens,
        })
    }

    /// GET a Books endpoint with the oauth header, refreshing the token
    /// and retrying exactly once on 401.
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}{}", self.api_base_url, path);
        let mut token = self.tokens.current().await?;

        let mut response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Zoho-oauthtoken {}", token))
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Books request failed: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Books token rejected (401), refreshing and retrying");
            token = self.tokens.refresh().await?;
            response = self
                .http
                .get(&url)
                .header(AUTHORIZATION, format!("Zoho-oauthtoken {}", token))
                .query(params)
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(format!("Books request failed: {}", e)))?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "Books answered {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Books body: {}", e)))?;

        // Books wraps errors in a 2xx envelope with a non-zero code.
        match body.get("code").and_then(|c| c.as_i64()) {
            None | Some(0) => Ok(body),
            Some(code) => {
                let message = body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown Books error");
                Err(ProviderError::InvalidResponse(format!(
                    "Books error code {}: {}",
                    code, message
                )))
            }
        }
    }
}

#[async_trait]
impl AccountingProvider for ZohoBooksProvider {
    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Vec<RemoteInvoice>, ProviderError> {
        let mut params = vec![("organization_id", self.organization_id.clone())];
        if let Some(currency) = &filter.currency_code {
            params.push(("currency_code", currency.clone()));
        }
        if let Some(from) = filter.date_from {
            params.push(("date_start", from.to_string()));
        }
        if let Some(to) = filter.date_to {
            params.push(("date_end", to.to_string()));
        }

        let body = self.get_json("/invoices", &params).await?;
        let invoices = body
            .get("invoices")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(vec![]));

        let invoices: Vec<RemoteInvoice> = serde_json::from_value(invoices)
            .map_err(|e| ProviderError::InvalidResponse(format!("invoice list: {}", e)))?;

        tracing::info!(count = invoices.len(), "Fetched invoices from Books");
        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, external_id: &str) -> Result<RemoteInvoice, ProviderError> {
        let params = vec![("organization_id", self.organization_id.clone())];
        let body = self
            .get_json(&format!("/invoices/{}", external_id), &params)
            .await?;

        let invoice = body
            .get("invoice")
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("no invoice in response".to_string()))?;

        serde_json::from_value(invoice)
            .map_err(|e| ProviderError::InvalidResponse(format!("invoice: {}", e)))
    }
}
