use crate::models::{JobCard, JobCardStatus, NewJobCard, User, WorkLogEntry};
use crate::services::attachments::{self, AttachmentKind, UploadedFile};
use crate::services::metrics::{JOB_CARDS_CREATED, NOTIFICATIONS};
use crate::services::notifications::job_card_email;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::ValidateEmail;

#[derive(Debug, Serialize)]
pub struct JobCardResponse {
    pub success: bool,
    pub job_card: JobCard,
    /// Whether the status notification went out. The persisted card is
    /// the durable result either way.
    pub notification_sent: bool,
}

#[derive(Debug, Default)]
struct SubmissionForm {
    email: String,
    status: Option<String>,
    notes: Option<String>,
    work_logs: Vec<WorkLogEntry>,
    selected_items: Vec<serde_json::Value>,
    assigned_user_id: Option<i64>,
    files: Vec<UploadedFile>,
}

fn bad_field(field: &str, err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("invalid field `{}`: {}", field, err))
}

async fn read_form(multipart: &mut Multipart) -> Result<SubmissionForm, AppError> {
    let mut form = SubmissionForm::default();
    let mut voice_notes = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "email" => {
                form.email = field.text().await.map_err(|e| bad_field("email", e))?;
            }
            "status" => {
                let raw = field.text().await.map_err(|e| bad_field("status", e))?;
                if !raw.is_empty() {
                    form.status = Some(raw);
                }
            }
            "notes" => {
                let raw = field.text().await.map_err(|e| bad_field("notes", e))?;
                if !raw.is_empty() {
                    form.notes = Some(raw);
                }
            }
            "work_logs" => {
                let raw = field.text().await.map_err(|e| bad_field("work_logs", e))?;
                if !raw.is_empty() {
                    form.work_logs =
                        serde_json::from_str(&raw).map_err(|e| bad_field("work_logs", e))?;
                }
            }
            "selected_items" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| bad_field("selected_items", e))?;
                if !raw.is_empty() {
                    form.selected_items =
                        serde_json::from_str(&raw).map_err(|e| bad_field("selected_items", e))?;
                }
            }
            "assigned_user_id" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| bad_field("assigned_user_id", e))?;
                if !raw.is_empty() {
                    form.assigned_user_id =
                        Some(raw.parse().map_err(|e| bad_field("assigned_user_id", e))?);
                }
            }
            "photos" | "documents" | "voice_note" => {
                let kind = match name.as_str() {
                    "photos" => AttachmentKind::Photo,
                    "documents" => AttachmentKind::Document,
                    _ => AttachmentKind::VoiceNote,
                };
                if kind == AttachmentKind::VoiceNote {
                    voice_notes += 1;
                    if voice_notes > 1 {
                        return Err(AppError::BadRequest(anyhow::anyhow!(
                            "at most one voice note is accepted"
                        )));
                    }
                }
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_field(kind.as_str(), e))?
                    .to_vec();
                form.files.push(UploadedFile {
                    kind,
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {
                // Unknown parts are ignored rather than rejected; the UI
                // sends a few presentational extras.
            }
        }
    }

    Ok(form)
}

fn decimal_field(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .unwrap_or(Decimal::ZERO),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Line total for one selected item: `rate` (falling back to
/// `unit_price`) times `quantity`, where a missing quantity counts as
/// one. Items carry whatever shape the invoice UI sends, so both
/// numeric and string-encoded values are accepted.
fn item_amount(item: &serde_json::Value) -> Decimal {
    let mut rate = item.get("rate").map(decimal_field).unwrap_or(Decimal::ZERO);
    if rate == Decimal::ZERO {
        rate = item
            .get("unit_price")
            .map(decimal_field)
            .unwrap_or(Decimal::ZERO);
    }
    let quantity = match item.get("quantity").map(decimal_field) {
        Some(q) if q > Decimal::ZERO => q,
        _ => Decimal::ONE,
    };
    rate * quantity
}

/// Looks up the submitted assignee. Unknown ids are rejected here,
/// before any row exists, so the database foreign key never has to
/// catch them.
async fn require_assignee(state: &AppState, id: Option<i64>) -> Result<Option<User>, AppError> {
    match id {
        None => Ok(None),
        Some(id) => state
            .users
            .get_user(id)
            .await?
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("assigned user {} not found", id))),
    }
}

/// Lenient lookup for cards that already exist: a missing user leaves
/// the notification without an assignee line instead of failing the
/// status update.
async fn resolve_assignee(state: &AppState, id: Option<i64>) -> Result<Option<User>, AppError> {
    match id {
        None => Ok(None),
        Some(id) => {
            let user = state.users.get_user(id).await?;
            if user.is_none() {
                tracing::warn!("Assigned user {} not found, leaving card unassigned", id);
            }
            Ok(user)
        }
    }
}

async fn notify(state: &AppState, card: &JobCard, status: JobCardStatus, assignee: Option<&User>) -> bool {
    let template = format!("job_card_{}", status.as_str());
    let message = job_card_email(card, status, assignee);
    match state.email.send(&message).await {
        Ok(_) => {
            NOTIFICATIONS
                .with_label_values(&[template.as_str(), "sent"])
                .inc();
            true
        }
        Err(e) => {
            NOTIFICATIONS
                .with_label_values(&[template.as_str(), "failed"])
                .inc();
            tracing::warn!(
                "Failed to send {} notification for job card {}: {}",
                status.as_str(),
                card.job_card_number,
                e
            );
            false
        }
    }
}

/// `POST /job-cards/invoice/:invoice_id`: multipart submission of one
/// job card. Attachments are validated up front; nothing is persisted
/// or stored when any file fails its allow-list.
pub async fn submit_job_card(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<JobCardResponse>, AppError> {
    let invoice = state
        .invoices
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("invoice {} not found", invoice_id))
        })?;

    let form = read_form(&mut multipart).await?;

    if !form.email.validate_email() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "`{}` is not a valid email address",
            form.email
        )));
    }
    let status = match form.status.as_deref() {
        None => JobCardStatus::Pending,
        Some(raw) => JobCardStatus::parse(raw)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("unknown status `{}`", raw)))?,
    };
    for entry in &form.work_logs {
        entry
            .validate()
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;
    }

    let assignee = require_assignee(&state, form.assigned_user_id).await?;

    // Fail-fast: every attachment is checked before anything persists.
    attachments::validate_all(&form.files)?;

    let now = chrono::Utc::now();
    let in_month = state
        .job_cards
        .count_job_cards_in_month(now.year(), now.month())
        .await?;
    let job_card_number = format!("JC-{}-{:02}-{:04}", now.year(), now.month(), in_month + 1);

    let total_selected_amount = form.selected_items.iter().map(item_amount).sum();

    let new_card = NewJobCard {
        job_card_number,
        invoice_id: invoice.id,
        invoice_number: invoice.invoice_number.clone(),
        client_name: invoice.client_name.clone(),
        email: form.email.clone(),
        status,
        notes: form.notes.clone(),
        selected_items: form.selected_items.clone(),
        total_selected_amount,
        work_logs: form.work_logs.clone(),
        assigned_user_id: form.assigned_user_id,
    };
    let card = state.job_cards.create_job_card(&new_card).await?;
    JOB_CARDS_CREATED.with_label_values(&[status.as_str()]).inc();

    let mut photos = Vec::new();
    let mut documents = Vec::new();
    let mut voice_note = None;
    for file in &form.files {
        let key = file.storage_key(card.id);
        state.storage.upload(&key, file.data.clone()).await?;
        match file.kind {
            AttachmentKind::Photo => photos.push(key),
            AttachmentKind::Document => documents.push(key),
            AttachmentKind::VoiceNote => voice_note = Some(key),
        }
    }
    let card = state
        .job_cards
        .set_attachments(card.id, &photos, &documents, voice_note.as_deref())
        .await?;

    let notification_sent = notify(&state, &card, status, assignee.as_ref()).await;

    tracing::info!(
        job_card = %card.job_card_number,
        invoice = %card.invoice_number,
        status = status.as_str(),
        photos = photos.len(),
        documents = documents.len(),
        "Job card created"
    );

    Ok(Json(JobCardResponse {
        success: true,
        job_card: card,
        notification_sent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// `POST /job-cards/:id/status`: advance a card through its lifecycle.
/// Illegal transitions are rejected without touching the row.
pub async fn update_job_card_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<JobCardResponse>, AppError> {
    let next = JobCardStatus::parse(&request.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("unknown status `{}`", request.status))
    })?;

    let card = state
        .job_cards
        .get_job_card(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("job card {} not found", id)))?;
    let current = JobCardStatus::parse(&card.status).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "job card {} has corrupt status `{}`",
            id,
            card.status
        ))
    })?;

    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "illegal transition from `{}` to `{}`",
            current.as_str(),
            next.as_str()
        )));
    }

    let card = state.job_cards.update_status(id, next).await?;

    let assignee = resolve_assignee(&state, card.assigned_user_id).await?;
    let notification_sent = notify(&state, &card, next, assignee.as_ref()).await;

    Ok(Json(JobCardResponse {
        success: true,
        job_card: card,
        notification_sent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
}

pub async fn recent_job_cards(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<JobCard>>, AppError> {
    let limit = params.limit.unwrap_or(6).clamp(1, 50);
    let cards = state.job_cards.recent_job_cards(limit).await?;
    Ok(Json(cards))
}
