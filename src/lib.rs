//! Production-flow inventory ledger for a furniture factory.
//!
//! Stock is tracked per pipeline section (two part buckets on each part,
//! seven product buckets per product) and every mutation flows through an
//! append-only movement log, so counters can always be rebuilt from the
//! ledger.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod flow;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::db::DbPool;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let services = handlers::AppServices::build(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }

    pub fn job_service(&self) -> Arc<services::jobs::JobService> {
        self.services.jobs.clone()
    }

    pub fn maintenance_service(&self) -> Arc<services::maintenance::MaintenanceService> {
        self.services.maintenance.clone()
    }

    pub fn report_service(&self) -> Arc<services::reports::ReportService> {
        self.services.reports.clone()
    }
}

/// Uniform success envelope.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/movements", post(handlers::movements::submit_movement))
        .route(
            "/jobs",
            post(handlers::jobs::create_job).get(handlers::jobs::list_jobs),
        )
        .route(
            "/jobs/default",
            put(handlers::jobs::set_default_job).get(handlers::jobs::get_default_job),
        )
        .route(
            "/jobs/:id",
            get(handlers::jobs::get_job).delete(handlers::jobs::delete_job),
        )
        .route("/jobs/:id/rewind", post(handlers::jobs::rewind_job))
        .route("/jobs/:id/consumption", get(handlers::jobs::job_consumption))
        .route(
            "/maintenance/purge-logs",
            post(handlers::maintenance::purge_logs),
        )
        .route(
            "/maintenance/purge-logs-and-zero",
            post(handlers::maintenance::purge_logs_and_zero),
        )
        .route(
            "/maintenance/rebuild-stocks",
            post(handlers::maintenance::rebuild_stocks),
        )
}

/// Assemble the full application router with its middleware stack.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
