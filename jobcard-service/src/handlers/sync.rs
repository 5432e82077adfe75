use crate::models::SyncSummary;
use crate::services::sync;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// `POST /sync`: pull the full invoice set from the accounting provider
/// and upsert it locally.
pub async fn sync_invoices(State(state): State<AppState>) -> Result<Json<SyncSummary>, AppError> {
    let summary = sync::sync_invoices(state.books.as_ref(), state.invoices.as_ref()).await?;
    Ok(Json(summary))
}
