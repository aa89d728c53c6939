//! Professor directory, registration and rating handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::data::faculty::FacultyTables;
use crate::data::professors::{get_professor, register_professor, search_professors};
use crate::data::ratings::{RatingScores, get_rating, submit_rating};
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::identity::Identity;
use crate::web::routes::{cache, with_cache_control};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct ProfessorSummary {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct RegisterProfessorRequest {
    pub name: String,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RatingResponse {
    #[ts(type = "number")]
    pub professor_id: i64,
    /// The caller's current rating, or `null` if they have not rated yet.
    pub rating: Option<RatingScores>,
}

/// Resolve the caller's tables and confirm the professor belongs to that faculty.
pub(super) async fn professor_scope(
    state: &AppState,
    identity: &Identity,
    professor_id: i64,
) -> Result<FacultyTables, ApiError> {
    let tables = state.tables(identity.faculty(state).await?);
    get_professor(state.data.as_ref(), &tables, professor_id)
        .await
        .map_err(|e| db_error("Load professor", e))?
        .or_not_found("Professor", professor_id)?;
    Ok(tables)
}

/// `GET /api/professors?search=`
pub async fn list_professors(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let tables = state.tables(identity.faculty(&state).await?);
    let professors = search_professors(state.data.as_ref(), &tables, &params.search)
        .await
        .map_err(|e| db_error("Search professors", e))?;

    let body: Vec<ProfessorSummary> = professors
        .into_iter()
        .map(|p| ProfessorSummary {
            id: p.id,
            name: p.nombre_apellido,
        })
        .collect();
    Ok(with_cache_control(body, cache::PRIVATE))
}

/// `POST /api/professors`
pub async fn create_professor(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<RegisterProfessorRequest>,
) -> Result<Response, ApiError> {
    let tables = state.tables(identity.faculty(&state).await?);
    let name = register_professor(
        state.data.as_ref(),
        &tables,
        &body.name,
        state.config.duplicate_threshold,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "name": name }))).into_response())
}

/// `GET /api/professors/{id}/rating`
pub async fn get_my_rating(
    State(state): State<AppState>,
    identity: Identity,
    Path(professor_id): Path<i64>,
) -> Result<Response, ApiError> {
    let tables = professor_scope(&state, &identity, professor_id).await?;
    let rating = get_rating(state.data.as_ref(), &tables, &identity.user_id, professor_id)
        .await
        .map_err(|e| db_error("Load rating", e))?;
    Ok(with_cache_control(
        RatingResponse {
            professor_id,
            rating,
        },
        cache::PRIVATE,
    ))
}

/// `PUT /api/professors/{id}/rating`
pub async fn put_my_rating(
    State(state): State<AppState>,
    identity: Identity,
    Path(professor_id): Path<i64>,
    Json(scores): Json<RatingScores>,
) -> Result<Json<RatingResponse>, ApiError> {
    let scores = scores.validated()?;
    let tables = professor_scope(&state, &identity, professor_id).await?;
    submit_rating(
        state.data.as_ref(),
        &tables,
        &identity.user_id,
        professor_id,
        scores,
    )
    .await
    .map_err(|e| db_error("Submit rating", e))?;

    Ok(Json(RatingResponse {
        professor_id,
        rating: Some(scores),
    }))
}
