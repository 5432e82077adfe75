//! Domain models for jobcard-service.

pub mod invoice;
pub mod job_card;
pub mod user;

pub use invoice::{Invoice, InvoiceStatus, SyncSummary, UpsertInvoice, UpsertOutcome};
pub use job_card::{JobCard, JobCardStatus, NewJobCard, TaskType, WorkLogEntry};
pub use user::User;
