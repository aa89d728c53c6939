//! Profile handlers: reading and choosing the caller's faculty.

use axum::extract::State;
use axum::response::{Json, Response};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::data::faculty::Faculty;
use crate::data::profiles::{get_profile as load_profile, set_faculty};
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};
use crate::web::identity::Identity;
use crate::web::routes::{cache, with_cache_control};

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileResponse {
    pub user_id: String,
    pub email: String,
    /// `None` until the user picks a faculty, or when the stored value is unknown.
    pub faculty: Option<Faculty>,
    pub faculty_label: Option<String>,
    /// Whether the faculty may still be changed.
    pub can_change_faculty: bool,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub facultad: String,
}

fn response(identity: Identity, faculty: Option<Faculty>, state: &AppState) -> ProfileResponse {
    ProfileResponse {
        user_id: identity.user_id,
        email: identity.email,
        faculty,
        faculty_label: faculty.map(|f| f.label().to_owned()),
        can_change_faculty: faculty.is_none() || state.config.allow_faculty_change,
    }
}

/// `GET /api/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response, ApiError> {
    let faculty = load_profile(state.data.as_ref(), &identity.user_id)
        .await
        .map_err(|e| db_error("Load profile", e))?
        .and_then(|p| p.facultad)
        .and_then(|f| Faculty::parse(&f));
    Ok(with_cache_control(
        response(identity, faculty, &state),
        cache::PRIVATE,
    ))
}

/// `PUT /api/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let faculty = Faculty::parse(&body.facultad)
        .ok_or_else(|| ApiError::bad_request(format!("unknown faculty {:?}", body.facultad)))?;

    set_faculty(
        state.data.as_ref(),
        &identity.user_id,
        faculty,
        state.config.allow_faculty_change,
    )
    .await?;

    Ok(Json(response(identity, Some(faculty), &state)))
}
