//! Outbound collaborator contracts: accounting provider, file-storage
//! provider and the notification channel, plus their Zoho/SMTP
//! implementations.

pub mod books;
pub mod email;
pub mod token;
pub mod workdrive;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use service_core::error::AppError;
use thiserror::Error;

pub use books::ZohoBooksProvider;
pub use email::{MockEmailProvider, SmtpProvider};
pub use token::{TokenManager, ZohoCredentials};
pub use workdrive::ZohoWorkDriveProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure, timeout or non-2xx answer.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered 2xx but the payload does not parse.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) | ProviderError::Authentication(msg) => {
                AppError::ProviderUnavailable(msg)
            }
            ProviderError::InvalidResponse(msg) => {
                AppError::InternalError(anyhow::anyhow!("malformed provider payload: {}", msg))
            }
            other => AppError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

/// One invoice line item as the accounting provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

/// One invoice record as the accounting provider reports it. Shapes are
/// explicit here; unknown status strings are rejected downstream rather
/// than passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub customer_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub status: String,
    pub currency_code: String,
    pub total: Decimal,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub sub_total: Option<Decimal>,
    #[serde(default)]
    pub tax_total: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none_date")]
    pub last_payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
}

/// The provider sends `""` where a date is absent.
fn empty_string_as_none_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Filters forwarded to the accounting provider's invoice listing.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub currency_code: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[async_trait]
pub trait AccountingProvider: Send + Sync {
    async fn list_invoices(&self, filter: &InvoiceFilter)
        -> Result<Vec<RemoteInvoice>, ProviderError>;
    async fn get_invoice(&self, external_id: &str) -> Result<RemoteInvoice, ProviderError>;
}

#[async_trait]
pub trait FileStorageProvider: Send + Sync {
    /// Names of the files (not folders) in the given folder.
    async fn list_files(&self, folder_id: &str) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError>;
    fn is_enabled(&self) -> bool;
}
