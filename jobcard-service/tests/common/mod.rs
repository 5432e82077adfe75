//! Common test utilities: in-memory stores and stub providers wired
//! into the real router, driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{Datelike, Utc};
use http_body_util::BodyExt;
use jobcard_service::models::{
    Invoice, InvoiceStatus, JobCard, JobCardStatus, NewJobCard, UpsertInvoice, UpsertOutcome, User,
};
use jobcard_service::services::providers::{
    AccountingProvider, EmailMessage, EmailProvider, FileStorageProvider, InvoiceFilter,
    ProviderError, ProviderResponse, RemoteInvoice,
};
use jobcard_service::services::reconcile::FilenameRule;
use jobcard_service::services::{InvoiceStore, JobCardStore, Storage, UserStore};
use jobcard_service::startup::{router, AppState, ReconcileSettings};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use tower::ServiceExt;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,jobcard_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Default)]
struct MemoryInner {
    invoices: Vec<Invoice>,
    job_cards: Vec<JobCard>,
    users: HashMap<i64, User>,
}

/// In-memory stand-in for the Postgres stores.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn seed_invoice(&self, invoice_number: &str, client_name: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.invoices.len() as i64 + 1;
        let now = Utc::now();
        inner.invoices.push(Invoice {
            id,
            external_id: format!("ext-{}", invoice_number),
            invoice_number: invoice_number.to_string(),
            client_name: client_name.to_string(),
            client_email: None,
            client_address: None,
            client_phone: None,
            description: None,
            amount: Decimal::from(1000),
            tax_rate: Decimal::ZERO,
            total_amount: Decimal::from(1000),
            balance: Decimal::from(1000),
            currency_code: "KES".to_string(),
            status: "sent".to_string(),
            issue_date: None,
            due_date: None,
            paid_date: None,
            created_at: now,
            updated_at: now,
            synced_at: now,
        });
        id
    }

    pub fn seed_user(&self, id: i64, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                email: format!("{}@example.test", name.to_lowercase()),
                is_admin: false,
                created_at: Utc::now(),
            },
        );
    }

    pub fn invoice_count(&self) -> usize {
        self.inner.lock().unwrap().invoices.len()
    }

    pub fn invoice_by_external_id(&self, external_id: &str) -> Option<Invoice> {
        self.inner
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|i| i.external_id == external_id)
            .cloned()
    }

    pub fn job_card_count(&self) -> usize {
        self.inner.lock().unwrap().job_cards.len()
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn upsert_invoice(&self, invoice: &UpsertInvoice) -> Result<UpsertOutcome, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner
            .invoices
            .iter_mut()
            .find(|i| i.external_id == invoice.external_id)
        {
            existing.invoice_number = invoice.invoice_number.clone();
            existing.client_name = invoice.client_name.clone();
            existing.client_email = invoice.client_email.clone();
            existing.description = invoice.description.clone();
            existing.amount = invoice.amount;
            existing.tax_rate = invoice.tax_rate;
            existing.total_amount = invoice.total_amount;
            existing.balance = invoice.balance;
            existing.currency_code = invoice.currency_code.clone();
            existing.status = invoice.status.as_str().to_string();
            existing.issue_date = invoice.issue_date;
            existing.due_date = invoice.due_date;
            existing.paid_date = invoice.paid_date;
            existing.updated_at = now;
            existing.synced_at = now;
            return Ok(UpsertOutcome::Updated);
        }
        let id = inner.invoices.len() as i64 + 1;
        inner.invoices.push(Invoice {
            id,
            external_id: invoice.external_id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            client_name: invoice.client_name.clone(),
            client_email: invoice.client_email.clone(),
            client_address: None,
            client_phone: None,
            description: invoice.description.clone(),
            amount: invoice.amount,
            tax_rate: invoice.tax_rate,
            total_amount: invoice.total_amount,
            balance: invoice.balance,
            currency_code: invoice.currency_code.clone(),
            status: invoice.status.as_str().to_string(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            paid_date: invoice.paid_date,
            created_at: now,
            updated_at: now,
            synced_at: now,
        });
        Ok(UpsertOutcome::Created)
    }

    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invoices
            .iter()
            .filter(|i| status.map_or(true, |s| i.status == s.as_str()))
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobCardStore for MemoryStore {
    async fn create_job_card(&self, card: &NewJobCard) -> Result<JobCard, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.job_cards.len() as i64 + 1;
        let now = Utc::now();
        let created = JobCard {
            id,
            job_card_number: card.job_card_number.clone(),
            invoice_id: card.invoice_id,
            invoice_number: card.invoice_number.clone(),
            client_name: card.client_name.clone(),
            email: card.email.clone(),
            status: card.status.as_str().to_string(),
            notes: card.notes.clone(),
            selected_items: Json(card.selected_items.clone()),
            total_selected_amount: card.total_selected_amount,
            work_logs: Json(card.work_logs.clone()),
            assigned_user_id: card.assigned_user_id,
            photos: Json(vec![]),
            documents: Json(vec![]),
            voice_note: None,
            created_at: now,
            updated_at: now,
        };
        inner.job_cards.push(created.clone());
        Ok(created)
    }

    async fn get_job_card(&self, id: i64) -> Result<Option<JobCard>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.job_cards.iter().find(|c| c.id == id).cloned())
    }

    async fn set_attachments(
        &self,
        id: i64,
        photos: &[String],
        documents: &[String],
        voice_note: Option<&str>,
    ) -> Result<JobCard, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let card = inner
            .job_cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("job card {} not found", id)))?;
        card.photos = Json(photos.to_vec());
        card.documents = Json(documents.to_vec());
        card.voice_note = voice_note.map(str::to_string);
        card.updated_at = Utc::now();
        Ok(card.clone())
    }

    async fn update_status(&self, id: i64, status: JobCardStatus) -> Result<JobCard, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let card = inner
            .job_cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("job card {} not found", id)))?;
        card.status = status.as_str().to_string();
        card.updated_at = Utc::now();
        Ok(card.clone())
    }

    async fn recent_job_cards(&self, limit: i64) -> Result<Vec<JobCard>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut cards = inner.job_cards.clone();
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cards.truncate(limit.max(0) as usize);
        Ok(cards)
    }

    async fn count_job_cards_in_month(&self, year: i32, month: u32) -> Result<i64, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .job_cards
            .iter()
            .filter(|c| c.created_at.year() == year && c.created_at.month() == month)
            .count() as i64)
    }

    async fn count_job_cards_for_invoice(&self, invoice_id: i64) -> Result<i64, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .job_cards
            .iter()
            .filter(|c| c.invoice_id == invoice_id)
            .count() as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).cloned())
    }
}

/// Canned accounting provider.
#[derive(Default)]
pub struct StubBooks {
    invoices: Mutex<Vec<RemoteInvoice>>,
    unavailable: AtomicBool,
}

impl StubBooks {
    pub fn push(&self, raw: serde_json::Value) {
        let invoice: RemoteInvoice =
            serde_json::from_value(raw).expect("stub invoice must deserialize");
        self.invoices.lock().unwrap().push(invoice);
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountingProvider for StubBooks {
    async fn list_invoices(
        &self,
        _filter: &InvoiceFilter,
    ) -> Result<Vec<RemoteInvoice>, ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("connection refused".to_string()));
        }
        Ok(self.invoices.lock().unwrap().clone())
    }

    async fn get_invoice(&self, external_id: &str) -> Result<RemoteInvoice, ProviderError> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.invoice_id == external_id)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("no such invoice".to_string()))
    }
}

/// Canned file-storage provider.
#[derive(Default)]
pub struct StubWorkDrive {
    files: Mutex<Vec<String>>,
    pub requested_folders: Mutex<Vec<String>>,
}

impl StubWorkDrive {
    pub fn push(&self, name: &str) {
        self.files.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl FileStorageProvider for StubWorkDrive {
    async fn list_files(&self, folder_id: &str) -> Result<Vec<String>, ProviderError> {
        self.requested_folders
            .lock()
            .unwrap()
            .push(folder_id.to_string());
        Ok(self.files.lock().unwrap().clone())
    }
}

/// Email channel that records instead of sending.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingEmail {
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmail {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::SendFailed("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(ProviderResponse::success(Some("recorded".to_string())))
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Blob storage that records uploads in memory.
#[derive(Default)]
pub struct RecordingStorage {
    pub blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingStorage {
    pub fn upload_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.blobs.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("no blob `{}`", key)))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub books: Arc<StubBooks>,
    pub workdrive: Arc<StubWorkDrive>,
    pub email: Arc<RecordingEmail>,
    pub storage: Arc<RecordingStorage>,
}

pub fn spawn_app() -> TestApp {
    init_tracing();

    let store = Arc::new(MemoryStore::default());
    let books = Arc::new(StubBooks::default());
    let workdrive = Arc::new(StubWorkDrive::default());
    let email = Arc::new(RecordingEmail::default());
    let storage = Arc::new(RecordingStorage::default());

    let state = AppState {
        invoices: store.clone(),
        job_cards: store.clone(),
        users: store.clone(),
        books: books.clone(),
        workdrive: workdrive.clone(),
        email: email.clone(),
        storage: storage.clone(),
        settings: ReconcileSettings {
            scanned_folder_id: "folder-1".to_string(),
            filename_rule: FilenameRule::default(),
        },
    };

    TestApp {
        router: router(state),
        store,
        books,
        workdrive,
        email,
        storage,
    }
}

async fn read_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body")
        .to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response is JSON")
    };
    (status, value)
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router");
        read_json(response).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router");
        read_json(response).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        parts: &[Part],
    ) -> (StatusCode, serde_json::Value) {
        let boundary = "test-boundary-7MA4YWxkTrZu0gW";
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(multipart_body(boundary, parts)))
                    .expect("request"),
            )
            .await
            .expect("router");
        read_json(response).await
    }
}

pub enum Part {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: &'static str,
        content_type: &'static str,
        data: Vec<u8>,
    },
}

pub fn text(name: &'static str, value: impl Into<String>) -> Part {
    Part::Text {
        name,
        value: value.into(),
    }
}

pub fn file(
    name: &'static str,
    file_name: &'static str,
    content_type: &'static str,
    data: Vec<u8>,
) -> Part {
    Part::File {
        name,
        file_name,
        content_type,
        data,
    }
}

fn multipart_body(boundary: &str, parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
