//! Health handler.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use tracing::trace;
use ts_rs::TS;

use crate::state::AppState;

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub commit: String,
    pub schema_layout: String,
    pub timestamp: String,
}

/// Health check endpoint
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    trace!("health check requested");
    Json(HealthResponse {
        status: "healthy".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        commit: env!("GIT_COMMIT_SHORT").to_owned(),
        schema_layout: format!("{:?}", state.config.schema_layout).to_lowercase(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
