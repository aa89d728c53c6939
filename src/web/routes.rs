//! Web API router construction and shared response utilities.

use std::time::Duration;

use axum::{
    Router,
    http::HeaderValue,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::web::{comments, professors, profile, ranking, status};

/// Cache-Control presets.
pub mod cache {
    /// Per-user data. Never stored by shared caches.
    pub const PRIVATE: &str = "private, no-store, must-revalidate";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route(
            "/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/ranking", get(ranking::get_ranking))
        .route("/ranking/state", get(ranking::get_ranking_state))
        .route(
            "/professors",
            get(professors::list_professors).post(professors::create_professor),
        )
        .route(
            "/professors/{id}/rating",
            get(professors::get_my_rating).put(professors::put_my_rating),
        )
        .route(
            "/professors/{id}/comments",
            get(comments::list_comments).post(comments::post_comment),
        )
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        TraceLayer::new_for_http(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::memory::MemoryService;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    const EMAIL: &str = "ana@alumnos.ucn.cl";

    fn router() -> Router {
        create_router(AppState::new(Arc::new(MemoryService::new()), Config::default()))
    }

    fn request(method: Method, uri: &str, user: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, email)) = user {
            builder = builder.header("x-user-id", id).header("x-user-email", email);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = send(&router(), request(Method::GET, "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let (status, body) = send(&router(), request(Method::GET, "/api/ranking", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn foreign_domain_is_forbidden() {
        let user = Some(("u1", "ana@gmail.com"));
        let (status, _) = send(&router(), request(Method::GET, "/api/profile", user, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn ranking_requires_faculty() {
        let user = Some(("u1", EMAIL));
        let (status, body) = send(&router(), request(Method::GET, "/api/ranking", user, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "FACULTY_NOT_AVAILABLE");
    }

    #[tokio::test]
    async fn register_rate_and_rank_flow() {
        let router = router();
        let user = Some(("u1", EMAIL));

        let (status, body) = send(
            &router,
            request(Method::PUT, "/api/profile", user, Some(json!({"facultad": "derecho"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["faculty"], "derecho");
        assert_eq!(body["canChangeFaculty"], false);

        let (status, _) = send(
            &router,
            request(Method::POST, "/api/professors", user, Some(json!({"name": "Juan Perez"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &router,
            request(Method::POST, "/api/professors", user, Some(json!({"name": "juan perz"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"][0]["name"], "Juan Perez");

        let (_, list) = send(&router, request(Method::GET, "/api/professors?search=juan", user, None)).await;
        let id = list[0]["id"].as_i64().unwrap();

        let uri = format!("/api/professors/{id}/rating");
        let scores = json!({"personality": 5, "teachingMethod": 4, "responsibility": 3});
        let (status, _) = send(&router, request(Method::PUT, &uri, user, Some(scores))).await;
        assert_eq!(status, StatusCode::OK);

        let bad = json!({"personality": 6, "teachingMethod": 4, "responsibility": 3});
        let (status, _) = send(&router, request(Method::PUT, &uri, user, Some(bad))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&router, request(Method::GET, &uri, user, None)).await;
        assert_eq!(body["rating"]["personality"], 5);

        // No score rows exist in memory yet, so the ranking is empty but well formed.
        let (status, body) = send(&router, request(Method::GET, "/api/ranking?mode=all&sort=desc", user, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["committed"], true);

        let (status, body) = send(&router, request(Method::GET, "/api/ranking/state", user, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loadState"], "idle");
    }

    #[tokio::test]
    async fn faculty_cannot_be_switched() {
        let router = router();
        let user = Some(("u1", EMAIL));
        send(&router, request(Method::PUT, "/api/profile", user, Some(json!({"facultad": "derecho"})))).await;
        let (status, body) = send(
            &router,
            request(Method::PUT, "/api/profile", user, Some(json!({"facultad": "medicina"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "FACULTY_LOCKED");
    }

    #[tokio::test]
    async fn rating_unknown_professor_is_not_found() {
        let router = router();
        let user = Some(("u1", EMAIL));
        send(&router, request(Method::PUT, "/api/profile", user, Some(json!({"facultad": "medicina"})))).await;
        let (status, _) = send(&router, request(Method::GET, "/api/professors/99/rating", user, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comments_are_pending_until_approved() {
        let router = router();
        let user = Some(("u1", EMAIL));
        send(&router, request(Method::PUT, "/api/profile", user, Some(json!({"facultad": "comercial"})))).await;
        send(&router, request(Method::POST, "/api/professors", user, Some(json!({"name": "Ana Soto"})))).await;
        let (_, list) = send(&router, request(Method::GET, "/api/professors", user, None)).await;
        let id = list[0]["id"].as_i64().unwrap();
        let uri = format!("/api/professors/{id}/comments");

        let (status, _) = send(&router, request(Method::POST, &uri, user, Some(json!({"text": "Excelente"})))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let (status, _) = send(&router, request(Method::POST, &uri, user, Some(json!({"text": "  "})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&router, request(Method::GET, &uri, user, None)).await;
        assert_eq!(body, json!([]));
    }
}
