//! Comment handlers. New comments wait for moderation before anyone sees them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use ts_rs::TS;

use crate::data::comments::{list_approved_comments, submit_comment};
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};
use crate::web::identity::Identity;
use crate::web::professors::professor_scope;
use crate::web::routes::{cache, with_cache_control};

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct SubmitCommentRequest {
    pub text: String,
}

/// `GET /api/professors/{id}/comments`
pub async fn list_comments(
    State(state): State<AppState>,
    identity: Identity,
    Path(professor_id): Path<i64>,
) -> Result<Response, ApiError> {
    let tables = professor_scope(&state, &identity, professor_id).await?;
    let comments = list_approved_comments(state.data.as_ref(), &tables, professor_id)
        .await
        .map_err(|e| db_error("List comments", e))?;
    Ok(with_cache_control(comments, cache::PRIVATE))
}

/// `POST /api/professors/{id}/comments`
pub async fn post_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(professor_id): Path<i64>,
    Json(body): Json<SubmitCommentRequest>,
) -> Result<Response, ApiError> {
    let tables = professor_scope(&state, &identity, professor_id).await?;
    submit_comment(
        state.data.as_ref(),
        &tables,
        &identity.user_id,
        professor_id,
        &body.text,
    )
    .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "pending_moderation" })),
    )
        .into_response())
}
