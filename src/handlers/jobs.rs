use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::production_job::{self, JobStatus};
use crate::entities::production_log;
use crate::errors::ServiceError;
use crate::services::jobs::NewJob;
use crate::services::reports::JobConsumption;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, Default)]
pub struct JobListQuery {
    /// Optional status filter (slug, e.g. "in_progress").
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobLogEntry {
    pub log: production_log::Model,
    /// Section that was current when this log was applied.
    pub prev_section: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub job: production_job::Model,
    pub history: Vec<JobLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSummary {
    pub logs_deleted: u64,
    pub jobs_deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct RewindRequest {
    pub target_cursor: usize,
}

#[derive(Debug, Serialize)]
pub struct RewindResponse {
    pub logs_removed: u64,
    pub new_current_section: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DefaultJobRequest {
    /// Omit or null to clear the default.
    pub job_id: Option<Uuid>,
}

/// POST /api/v1/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<NewJob>,
) -> ApiResult<production_job::Model> {
    let job = state.job_service().create_job(payload).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Vec<production_job::Model>> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(raw.parse::<JobStatus>().map_err(|_| {
            ServiceError::ValidationError(format!("unknown status: {raw}"))
        })?),
        None => None,
    };
    let jobs = state.job_service().list_jobs(status).await?;
    Ok(Json(ApiResponse::success(jobs)))
}

/// GET /api/v1/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobDetail> {
    let job = state.job_service().get_job(id).await?;
    let history = state
        .job_service()
        .history(id)
        .await?
        .into_iter()
        .map(|(log, prev)| JobLogEntry {
            log,
            prev_section: prev.map(|s| s.as_str().to_string()),
        })
        .collect();
    Ok(Json(ApiResponse::success(JobDetail { job, history })))
}

/// DELETE /api/v1/jobs/:id
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteSummary> {
    let (logs_deleted, jobs_deleted) = state.job_service().delete_job_completely(id).await?;
    Ok(Json(ApiResponse::success(DeleteSummary {
        logs_deleted,
        jobs_deleted,
    })))
}

/// POST /api/v1/jobs/:id/rewind
pub async fn rewind_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RewindRequest>,
) -> ApiResult<RewindResponse> {
    let outcome = state
        .job_service()
        .rewind(id, payload.target_cursor)
        .await?;
    Ok(Json(ApiResponse::success(RewindResponse {
        logs_removed: outcome.logs_removed,
        new_current_section: outcome
            .new_current_section
            .map(|s| s.as_str().to_string()),
    })))
}

/// GET /api/v1/jobs/:id/consumption
pub async fn job_consumption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobConsumption> {
    // 404 for unknown jobs rather than an empty report.
    state.job_service().get_job(id).await?;
    let report = state.report_service().consumption_for_job(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// PUT /api/v1/jobs/default
pub async fn set_default_job(
    State(state): State<AppState>,
    Json(payload): Json<DefaultJobRequest>,
) -> ApiResult<Option<Uuid>> {
    state.job_service().set_default_job(payload.job_id).await?;
    Ok(Json(ApiResponse::success(payload.job_id)))
}

/// GET /api/v1/jobs/default
pub async fn get_default_job(
    State(state): State<AppState>,
) -> ApiResult<Option<production_job::Model>> {
    let job = state.job_service().default_job().await?;
    Ok(Json(ApiResponse::success(job)))
}
