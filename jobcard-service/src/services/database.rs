//! Postgres persistence for jobcard-service.

use crate::models::{
    Invoice, InvoiceStatus, JobCard, JobCardStatus, NewJobCard, UpsertInvoice, UpsertOutcome, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{InvoiceStore, JobCardStore, UserStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument};

const INVOICE_COLUMNS: &str = "id, external_id, invoice_number, client_name, client_email, \
     client_address, client_phone, description, amount, tax_rate, total_amount, balance, \
     currency_code, status, issue_date, due_date, paid_date, created_at, updated_at, synced_at";

const JOB_CARD_COLUMNS: &str = "id, job_card_number, invoice_id, invoice_number, client_name, \
     email, status, notes, selected_items, total_selected_amount, work_logs, assigned_user_id, \
     photos, documents, voice_note, created_at, updated_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "jobcard-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(external_id = %invoice.external_id))]
    async fn upsert_invoice(&self, invoice: &UpsertInvoice) -> Result<UpsertOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_invoice"])
            .start_timer();

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM invoices WHERE external_id = $1")
                .bind(&invoice.external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to look up invoice: {}", e))
                })?;

        let outcome = if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE invoices
                SET invoice_number = $2, client_name = $3, client_email = $4, description = $5,
                    amount = $6, tax_rate = $7, total_amount = $8, balance = $9,
                    currency_code = $10, status = $11, issue_date = $12, due_date = $13,
                    paid_date = $14, updated_at = now(), synced_at = now()
                WHERE external_id = $1
                "#,
            )
            .bind(&invoice.external_id)
            .bind(&invoice.invoice_number)
            .bind(&invoice.client_name)
            .bind(&invoice.client_email)
            .bind(&invoice.description)
            .bind(invoice.amount)
            .bind(invoice.tax_rate)
            .bind(invoice.total_amount)
            .bind(invoice.balance)
            .bind(&invoice.currency_code)
            .bind(invoice.status.as_str())
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.paid_date)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
            })
            .map(|_| UpsertOutcome::Updated)?
        } else {
            sqlx::query(
                r#"
                INSERT INTO invoices (external_id, invoice_number, client_name, client_email,
                    description, amount, tax_rate, total_amount, balance, currency_code, status,
                    issue_date, due_date, paid_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(&invoice.external_id)
            .bind(&invoice.invoice_number)
            .bind(&invoice.client_name)
            .bind(&invoice.client_email)
            .bind(&invoice.description)
            .bind(invoice.amount)
            .bind(invoice.tax_rate)
            .bind(invoice.total_amount)
            .bind(invoice.balance)
            .bind(&invoice.currency_code)
            .bind(invoice.status.as_str())
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.paid_date)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", e))
            })
            .map(|_| UpsertOutcome::Created)?
        };

        timer.observe_duration();
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = limit.clamp(1, 100);
        let skip = skip.max(0);

        let invoices = if let Some(status) = status {
            sqlx::query_as::<_, Invoice>(&format!(
                "SELECT {} FROM invoices WHERE status = $1 ORDER BY id OFFSET $2 LIMIT $3",
                INVOICE_COLUMNS
            ))
            .bind(status.as_str())
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                "SELECT {} FROM invoices ORDER BY id OFFSET $1 LIMIT $2",
                INVOICE_COLUMNS
            ))
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();
        Ok(invoices)
    }
}

#[async_trait]
impl JobCardStore for Database {
    #[instrument(skip(self, card), fields(invoice_id = %card.invoice_id))]
    async fn create_job_card(&self, card: &NewJobCard) -> Result<JobCard, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_job_card"])
            .start_timer();

        let created = sqlx::query_as::<_, JobCard>(&format!(
            r#"
            INSERT INTO job_cards (job_card_number, invoice_id, invoice_number, client_name,
                email, status, notes, selected_items, total_selected_amount, work_logs,
                assigned_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            JOB_CARD_COLUMNS
        ))
        .bind(&card.job_card_number)
        .bind(card.invoice_id)
        .bind(&card.invoice_number)
        .bind(&card.client_name)
        .bind(&card.email)
        .bind(card.status.as_str())
        .bind(&card.notes)
        .bind(Json(&card.selected_items))
        .bind(card.total_selected_amount)
        .bind(Json(&card.work_logs))
        .bind(card.assigned_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create job card: {}", e))
        })?;

        timer.observe_duration();
        info!(job_card_id = %created.id, number = %created.job_card_number, "Job card created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_job_card(&self, id: i64) -> Result<Option<JobCard>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_job_card"])
            .start_timer();

        let card = sqlx::query_as::<_, JobCard>(&format!(
            "SELECT {} FROM job_cards WHERE id = $1",
            JOB_CARD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get job card: {}", e)))?;

        timer.observe_duration();
        Ok(card)
    }

    #[instrument(skip(self, photos, documents, voice_note))]
    async fn set_attachments(
        &self,
        id: i64,
        photos: &[String],
        documents: &[String],
        voice_note: Option<&str>,
    ) -> Result<JobCard, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_attachments"])
            .start_timer();

        let card = sqlx::query_as::<_, JobCard>(&format!(
            r#"
            UPDATE job_cards
            SET photos = $2, documents = $3, voice_note = $4, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_CARD_COLUMNS
        ))
        .bind(id)
        .bind(Json(photos))
        .bind(Json(documents))
        .bind(voice_note)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record attachments: {}", e))
        })?;

        timer.observe_duration();
        Ok(card)
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: JobCardStatus) -> Result<JobCard, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_status"])
            .start_timer();

        let card = sqlx::query_as::<_, JobCard>(&format!(
            r#"
            UPDATE job_cards
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_CARD_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update job card status: {}", e))
        })?;

        timer.observe_duration();
        Ok(card)
    }

    #[instrument(skip(self))]
    async fn recent_job_cards(&self, limit: i64) -> Result<Vec<JobCard>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recent_job_cards"])
            .start_timer();

        let cards = sqlx::query_as::<_, JobCard>(&format!(
            "SELECT {} FROM job_cards ORDER BY created_at DESC LIMIT $1",
            JOB_CARD_COLUMNS
        ))
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list recent job cards: {}", e))
        })?;

        timer.observe_duration();
        Ok(cards)
    }

    #[instrument(skip(self))]
    async fn count_job_cards_in_month(&self, year: i32, month: u32) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_job_cards_in_month"])
            .start_timer();

        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("invalid month {}-{}", year, month))
        })?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("invalid month rollover")))?;

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM job_cards WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start.and_time(chrono::NaiveTime::MIN).and_utc())
        .bind(end.and_time(chrono::NaiveTime::MIN).and_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count job cards: {}", e)))?;

        timer.observe_duration();
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn count_job_cards_for_invoice(&self, invoice_id: i64) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_job_cards_for_invoice"])
            .start_timer();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM job_cards WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count job cards: {}", e))
                })?;

        timer.observe_duration();
        Ok(count)
    }
}

#[async_trait]
impl UserStore for Database {
    #[instrument(skip(self))]
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, is_admin, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();
        Ok(user)
    }
}
