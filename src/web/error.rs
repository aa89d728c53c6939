//! Standardized API error responses.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

use crate::data::comments::SubmitCommentError;
use crate::data::professors::RegisterError;
use crate::data::profiles::ProfileError;
use crate::data::ratings::RatingError;
use crate::data::service::DataError;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    FacultyNotAvailable,
    Conflict,
    FacultyLocked,
    UpstreamUnavailable,
    UpstreamTimeout,
    InternalError,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound | Self::FacultyNotAvailable => StatusCode::NOT_FOUND,
            Self::Conflict | Self::FacultyLocked => StatusCode::CONFLICT,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct ApiErrorBody {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    code: ApiErrorCode,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code(&self) -> ApiErrorCode {
        self.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Conflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    pub fn faculty_not_available() -> Self {
        Self::new(ApiErrorCode::FacultyNotAvailable, "faculty not available")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.code.status(), Json(body)).into_response()
    }
}

/// Log a data service failure and map it to a response.
///
/// The response carries only `context`; backend details stay in the logs.
pub fn db_error(context: &str, e: DataError) -> ApiError {
    tracing::error!(error = %e, "{context} failed");
    let message = format!("{context} failed");
    match e {
        DataError::Timeout(_) => ApiError::new(ApiErrorCode::UpstreamTimeout, message),
        DataError::Unavailable(_) | DataError::Database(_) => {
            ApiError::new(ApiErrorCode::UpstreamUnavailable, message)
        }
        DataError::InvalidIdentifier(_) | DataError::Decode { .. } => ApiError::internal_error(message),
    }
}

pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, kind: &str, id: impl Display) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, kind: &str, id: impl Display) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(format!("{kind} {id} not found")))
    }
}

impl From<RatingError> for ApiError {
    fn from(e: RatingError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<RegisterError> for ApiError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::InvalidName(e) => ApiError::bad_request(e.to_string()),
            RegisterError::Duplicate { similar } => {
                let names: Vec<Value> = similar
                    .iter()
                    .map(|s| serde_json::json!({ "name": s.name, "distance": s.distance }))
                    .collect();
                ApiError::conflict("a professor with a similar name already exists")
                    .with_details(Value::Array(names))
            }
            RegisterError::Data(e) => db_error("Register professor", e),
        }
    }
}

impl From<SubmitCommentError> for ApiError {
    fn from(e: SubmitCommentError) -> Self {
        match e {
            SubmitCommentError::Invalid(e) => ApiError::bad_request(e.to_string()),
            SubmitCommentError::Data(e) => db_error("Submit comment", e),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::FacultyLocked { .. } => {
                ApiError::new(ApiErrorCode::FacultyLocked, e.to_string())
            }
            ProfileError::Data(e) => db_error("Update profile", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn data_errors_map_to_gateway_statuses() {
        let e = db_error("Load", DataError::Timeout(Duration::from_secs(1)));
        assert_eq!(e.code().status(), StatusCode::GATEWAY_TIMEOUT);
        let e = db_error("Load", DataError::Unavailable("down".into()));
        assert_eq!(e.code().status(), StatusCode::BAD_GATEWAY);
        let e = db_error("Load", DataError::InvalidIdentifier("x y".into()));
        assert_eq!(e.code().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn undecodable_rows_are_internal_errors() {
        let source = serde_json::from_str::<i64>("\"x\"").unwrap_err();
        let e = db_error(
            "Load ranking",
            DataError::Decode {
                table: "profesor_promedios".into(),
                source,
            },
        );
        assert_eq!(e.code(), ApiErrorCode::InternalError);
        assert_eq!(e.message, "Load ranking failed");
    }

    #[test]
    fn or_not_found_formats_message() {
        let err = None::<i32>.or_not_found("Professor", 7).unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::NotFound);
        assert_eq!(err.message, "Professor 7 not found");
    }

    #[test]
    fn duplicate_registration_is_conflict_with_details() {
        let err = ApiError::from(RegisterError::Duplicate {
            similar: vec![crate::data::names::SimilarName {
                name: "Juan Perez".into(),
                distance: 1,
            }],
        });
        assert_eq!(err.code(), ApiErrorCode::Conflict);
        assert_eq!(err.details.unwrap()[0]["name"], "Juan Perez");
    }
}
