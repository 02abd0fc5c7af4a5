use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::errors::ServiceError;
use crate::AppState;

/// Liveness plus a database ping.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ServiceError> {
    crate::db::check_connection(state.db.as_ref()).await?;
    Ok(Json(json!({ "status": "ok" })))
}
