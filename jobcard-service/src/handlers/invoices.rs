use crate::models::{Invoice, InvoiceStatus};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(InvoiceStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("unknown invoice status `{}`", raw))
        })?),
    };
    let skip = params.skip.unwrap_or(0).max(0);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let invoices = state.invoices.list_invoices(status, skip, limit).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .invoices
        .get_invoice(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("invoice {} not found", id)))?;
    Ok(Json(invoice))
}
