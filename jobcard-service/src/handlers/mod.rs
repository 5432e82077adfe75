pub mod health;
pub mod invoices;
pub mod job_cards;
pub mod reconcile;
pub mod sync;

pub use health::{health_check, metrics_endpoint, readiness_check, root_info};
pub use invoices::{get_invoice, list_invoices};
pub use job_cards::{recent_job_cards, submit_job_card, update_job_card_status};
pub use reconcile::reconcile;
pub use sync::sync_invoices;
