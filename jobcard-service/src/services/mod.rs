//! Service layer: persistence, outbound providers and the core engines.

pub mod attachments;
pub mod database;
pub mod metrics;
pub mod notifications;
pub mod providers;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod sync;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use storage::{LocalStorage, Storage};
pub use store::{InvoiceStore, JobCardStore, UserStore};
