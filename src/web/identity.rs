//! Caller identity supplied by the upstream identity proxy.
//!
//! Authentication itself happens upstream; this module only reads the
//! forwarded headers and enforces the institutional email domain.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::data::faculty::Faculty;
use crate::data::profiles::{is_institutional_email, user_faculty};
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (Some(user_id), Some(email)) = (header(parts, USER_ID_HEADER), header(parts, USER_EMAIL_HEADER))
        else {
            return Err(ApiError::unauthorized("authentication required"));
        };

        if !is_institutional_email(email, &state.config.institutional_domain) {
            tracing::debug!(email, "Rejected non-institutional identity");
            return Err(ApiError::forbidden(format!(
                "only @{} accounts may use this service",
                state.config.institutional_domain
            )));
        }

        Ok(Identity {
            user_id: user_id.to_owned(),
            email: email.to_owned(),
        })
    }
}

impl Identity {
    /// The caller's faculty, or a 404 when none is set or the stored value is unknown.
    pub async fn faculty(&self, state: &AppState) -> Result<Faculty, ApiError> {
        user_faculty(state.data.as_ref(), &self.user_id)
            .await
            .map_err(|e| db_error("Load profile", e))?
            .ok_or_else(ApiError::faculty_not_available)
    }
}
