//! Application startup and lifecycle management.

use crate::config::ServiceConfig;
use crate::handlers;
use crate::services::providers::{
    AccountingProvider, EmailProvider, FileStorageProvider, MockEmailProvider, SmtpProvider,
    ZohoBooksProvider, ZohoWorkDriveProvider,
};
use crate::services::reconcile::FilenameRule;
use crate::services::{Database, InvoiceStore, JobCardStore, LocalStorage, Storage, UserStore};
use axum::extract::DefaultBodyLimit;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Caps the multipart body: the largest legal submission is a voice
/// note plus a handful of photos and documents.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Per-request reconciliation settings carried in state rather than
/// re-read from the environment.
#[derive(Clone)]
pub struct ReconcileSettings {
    pub scanned_folder_id: String,
    pub filename_rule: FilenameRule,
}

/// Shared application state. Every collaborator sits behind a trait so
/// tests can substitute in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<dyn InvoiceStore>,
    pub job_cards: Arc<dyn JobCardStore>,
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn AccountingProvider>,
    pub workdrive: Arc<dyn FileStorageProvider>,
    pub email: Arc<dyn EmailProvider>,
    pub storage: Arc<dyn Storage>,
    pub settings: ReconcileSettings,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_info))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/sync", post(handlers::sync_invoices))
        .route("/reconcile", post(handlers::reconcile))
        .route("/invoices", get(handlers::list_invoices))
        .route("/invoices/:id", get(handlers::get_invoice))
        .route(
            "/job-cards/invoice/:invoice_id",
            post(handlers::submit_job_card),
        )
        .route("/job-cards/recent", get(handlers::recent_job_cards))
        .route("/job-cards/:id/status", post(handlers::update_job_card_status))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: ServiceConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to Postgres: {}", e);
            e
        })?;
        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
        let db = Arc::new(db);

        let timeout = Duration::from_secs(config.provider_timeout_secs);

        let books: Arc<dyn AccountingProvider> =
            Arc::new(ZohoBooksProvider::new(&config.books, timeout).map_err(|e| {
                tracing::error!("Failed to initialize accounting provider: {}", e);
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            })?);

        let workdrive: Arc<dyn FileStorageProvider> =
            Arc::new(ZohoWorkDriveProvider::new(&config.workdrive, timeout).map_err(|e| {
                tracing::error!("Failed to initialize file-storage provider: {}", e);
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            })?);

        let email: Arc<dyn EmailProvider> = if config.smtp.enabled {
            match SmtpProvider::new(config.smtp.clone()) {
                Ok(provider) => {
                    tracing::info!("SMTP email provider initialized");
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP provider: {}. Using mock.", e);
                    Arc::new(MockEmailProvider)
                }
            }
        } else {
            tracing::info!("SMTP provider disabled, using mock email provider");
            Arc::new(MockEmailProvider)
        };

        let storage: Arc<dyn Storage> =
            Arc::new(LocalStorage::new(&config.uploads_dir).await.map_err(|e| {
                tracing::error!(
                    "Failed to initialize local storage at {}: {}",
                    config.uploads_dir,
                    e
                );
                e
            })?);

        let state = AppState {
            invoices: db.clone(),
            job_cards: db.clone(),
            users: db,
            books,
            workdrive,
            email,
            storage,
            settings: ReconcileSettings {
                scanned_folder_id: config.workdrive.scanned_folder_id.clone(),
                filename_rule: FilenameRule {
                    marker: config.workdrive.invoice_marker.clone(),
                },
            },
        };

        let app = router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
