use crate::services::metrics::{NOTIFICATIONS, RECONCILE_CHECKS};
use crate::services::providers::{EmailMessage, InvoiceFilter};
use crate::services::reconcile::{
    classify, filter_invoice_numbers, normalize_currency, parse_status_filters, render_report_html,
    render_report_text, report_subject,
};
use crate::startup::AppState;
use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub date_from: String,
    #[serde(default)]
    pub date_to: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub currency: String,
    pub statuses: Vec<String>,
    pub books_invoices: usize,
    pub workdrive_files: usize,
    pub matched: usize,
    pub missing: usize,
    pub missing_list: Vec<String>,
    pub email_sent: bool,
    pub date_from: String,
    pub date_to: String,
}

fn parse_date(raw: &str, field: &str) -> Result<Option<NaiveDate>, AppError> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!(
                "{} `{}` is not a valid YYYY-MM-DD date",
                field,
                raw
            ))
        })
}

/// `POST /reconcile`: compare the accounting provider's invoice numbers
/// against the scanned-file folder and report the gap. Read-only apart
/// from the optional report email.
pub async fn reconcile(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let currency = if request.currency.trim().is_empty() {
        String::new()
    } else {
        normalize_currency(&request.currency)
    };
    let filters = parse_status_filters(&request.statuses)?;
    let date_from = parse_date(&request.date_from, "date_from")?;
    let date_to = parse_date(&request.date_to, "date_to")?;

    let filter = InvoiceFilter {
        currency_code: (!currency.is_empty()).then(|| currency.clone()),
        date_from,
        date_to,
    };
    let invoices = match state.books.list_invoices(&filter).await {
        Ok(invoices) => invoices,
        Err(e) => {
            RECONCILE_CHECKS.with_label_values(&["provider_error"]).inc();
            return Err(e.into());
        }
    };
    let book_numbers = filter_invoice_numbers(&invoices, &currency, &filters, date_from, date_to)?;

    let file_names = match state
        .workdrive
        .list_files(&state.settings.scanned_folder_id)
        .await
    {
        Ok(names) => names,
        Err(e) => {
            RECONCILE_CHECKS.with_label_values(&["provider_error"]).inc();
            return Err(e.into());
        }
    };
    let file_numbers: Vec<String> = file_names
        .iter()
        .filter_map(|name| state.settings.filename_rule.extract(name))
        .collect();

    let result = classify(&book_numbers, &file_numbers);

    let mut email_sent = false;
    if let Some(to) = request.email.as_deref().filter(|to| !to.is_empty()) {
        let message = EmailMessage {
            to: to.to_string(),
            subject: report_subject(&currency, &request.statuses, result.missing.len()),
            body_text: Some(render_report_text(
                &currency,
                book_numbers.len(),
                file_numbers.len(),
                result.matched,
                &result.missing,
            )),
            body_html: Some(render_report_html(
                &currency,
                book_numbers.len(),
                file_numbers.len(),
                result.matched,
                &result.missing,
            )),
        };
        match state.email.send(&message).await {
            Ok(_) => {
                NOTIFICATIONS
                    .with_label_values(&["reconcile_report", "sent"])
                    .inc();
                email_sent = true;
            }
            Err(e) => {
                // Best-effort: the report failing to send does not fail
                // the check.
                NOTIFICATIONS
                    .with_label_values(&["reconcile_report", "failed"])
                    .inc();
                tracing::warn!("Failed to send reconciliation report to {}: {}", to, e);
            }
        }
    }

    RECONCILE_CHECKS.with_label_values(&["ok"]).inc();

    Ok(Json(ReconcileResponse {
        success: true,
        currency,
        statuses: request.statuses,
        books_invoices: book_numbers.len(),
        workdrive_files: file_numbers.len(),
        matched: result.matched,
        missing: result.missing.len(),
        missing_list: result.missing,
        email_sent,
        date_from: request.date_from,
        date_to: request.date_to,
    }))
}
