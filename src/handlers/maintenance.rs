use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct PurgeSummary {
    pub logs_removed: u64,
    pub counters_zeroed: bool,
}

#[derive(Debug, Serialize)]
pub struct RebuildSummary {
    pub logs_replayed: u64,
}

/// POST /api/v1/maintenance/purge-logs
pub async fn purge_logs(State(state): State<AppState>) -> ApiResult<PurgeSummary> {
    let logs_removed = state.maintenance_service().purge_logs().await?;
    Ok(Json(ApiResponse::success(PurgeSummary {
        logs_removed,
        counters_zeroed: false,
    })))
}

/// POST /api/v1/maintenance/purge-logs-and-zero
pub async fn purge_logs_and_zero(State(state): State<AppState>) -> ApiResult<PurgeSummary> {
    let logs_removed = state.maintenance_service().purge_logs_and_zero().await?;
    Ok(Json(ApiResponse::success(PurgeSummary {
        logs_removed,
        counters_zeroed: true,
    })))
}

/// POST /api/v1/maintenance/rebuild-stocks
pub async fn rebuild_stocks(State(state): State<AppState>) -> ApiResult<RebuildSummary> {
    let logs_replayed = state.maintenance_service().rebuild_stocks().await?;
    Ok(Json(ApiResponse::success(RebuildSummary { logs_replayed })))
}
