use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::entities::{production_job, production_log};
use crate::services::jobs::NewMovement;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub log: production_log::Model,
    pub job: Option<production_job::Model>,
    pub closed: bool,
}

/// POST /api/v1/movements
pub async fn submit_movement(
    State(state): State<AppState>,
    Json(payload): Json<NewMovement>,
) -> ApiResult<MovementResponse> {
    let outcome = state.job_service().submit_movement(payload).await?;
    Ok(Json(ApiResponse::success(MovementResponse {
        log: outcome.log,
        job: outcome.job,
        closed: outcome.closed,
    })))
}
