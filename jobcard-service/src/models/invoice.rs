//! Invoice snapshot mirrored from the accounting provider.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Invoice lifecycle status as reported by the accounting provider.
///
/// Unrecognized strings are rejected at the sync boundary rather than
/// carried through as opaque text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Unpaid,
    Paid,
    PartiallyPaid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "unpaid" => Some(InvoiceStatus::Unpaid),
            "paid" => Some(InvoiceStatus::Paid),
            "partially_paid" => Some(InvoiceStatus::PartiallyPaid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether an invoice with this status is selected by `filter`.
    ///
    /// The `unpaid` filter also matches `sent`: the provider reports an
    /// issued-but-unpaid invoice as `sent`.
    pub fn matches_filter(&self, filter: InvoiceStatus) -> bool {
        *self == filter || (filter == InvoiceStatus::Unpaid && *self == InvoiceStatus::Sent)
    }
}

/// Local snapshot of a provider invoice. Rows are created and updated
/// only by the sync engine; the provider stays authoritative.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub external_id: String,
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub description: Option<String>,
    pub amount: Decimal,
    pub tax_rate: Decimal,
    pub total_amount: Decimal,
    pub balance: Decimal,
    pub currency_code: String,
    pub status: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

/// Validated field set written by one sync upsert, keyed by `external_id`.
#[derive(Debug, Clone)]
pub struct UpsertInvoice {
    pub external_id: String,
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub description: Option<String>,
    pub amount: Decimal,
    pub tax_rate: Decimal,
    pub total_amount: Decimal,
    pub balance: Decimal,
    pub currency_code: String,
    pub status: InvoiceStatus,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Outcome of one `sync_invoices` run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
}
