//! Store contracts for the two shared mutable resources (invoices, job
//! cards) and the user directory. The Postgres implementation lives in
//! [`crate::services::database`]; tests substitute in-memory fakes.

use crate::models::{
    Invoice, InvoiceStatus, JobCard, JobCardStatus, NewJobCard, UpsertInvoice, UpsertOutcome, User,
};
use async_trait::async_trait;
use service_core::error::AppError;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Create-or-overwrite keyed by external id. The local numeric id is
    /// preserved across updates; all mutable fields take the provider's
    /// current values.
    async fn upsert_invoice(&self, invoice: &UpsertInvoice) -> Result<UpsertOutcome, AppError>;

    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError>;

    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError>;
}

#[async_trait]
pub trait JobCardStore: Send + Sync {
    /// Persist the card and its work logs as one unit.
    async fn create_job_card(&self, card: &NewJobCard) -> Result<JobCard, AppError>;

    async fn get_job_card(&self, id: i64) -> Result<Option<JobCard>, AppError>;

    /// Record stored attachment references on an existing card.
    async fn set_attachments(
        &self,
        id: i64,
        photos: &[String],
        documents: &[String],
        voice_note: Option<&str>,
    ) -> Result<JobCard, AppError>;

    async fn update_status(&self, id: i64, status: JobCardStatus) -> Result<JobCard, AppError>;

    async fn recent_job_cards(&self, limit: i64) -> Result<Vec<JobCard>, AppError>;

    /// Cards created in the given calendar month; feeds job-card-number
    /// generation.
    async fn count_job_cards_in_month(&self, year: i32, month: u32) -> Result<i64, AppError>;

    async fn count_job_cards_for_invoice(&self, invoice_id: i64) -> Result<i64, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
}
