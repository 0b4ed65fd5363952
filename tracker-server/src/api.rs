//! Shared HTTP plumbing: state, error mapping and the assembled router.

use std::fmt::Display;

use axum::Router;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use tracker_core::{Database, StoreError, ValidationErrors};

use crate::config::Service;
use crate::{expenses, tasks};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Error returned by handlers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl ApiError {
    fn invalid(field: &str, message: String) -> Self {
        ApiError(StoreError::Validation(ValidationErrors::single(field, message)))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid("path", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            StoreError::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": format!("{entity} not found") })),
            )
                .into_response(),
            StoreError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": errors })),
            )
                .into_response(),
            StoreError::Storage(err) => {
                error!(error = %err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON request body whose deserialization errors name the offending field.
///
/// Content-type and syntax problems are still reported against `body`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        serde_path_to_error::deserialize(value)
            .map(JsonBody)
            .map_err(|err| deserialize_error(err, "body"))
    }
}

/// Query string extractor whose errors name the offending parameter.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let params = serde_urlencoded::Deserializer::new(form_urlencoded::parse(query.as_bytes()));
        serde_path_to_error::deserialize(params)
            .map(QueryParams)
            .map_err(|err| deserialize_error(err, "query"))
    }
}

fn deserialize_error<E: Display>(err: serde_path_to_error::Error<E>, whole: &str) -> ApiError {
    let message = err.inner().to_string();
    let path = err.path().to_string();
    let field = if path != "." {
        path.as_str()
    } else {
        missing_field(&message).unwrap_or(whole)
    }
    .to_owned();
    ApiError::invalid(&field, message)
}

/// serde reports an absent required field at the root, naming it only in
/// the message.
fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.split('`').next()
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the router for one service with CORS and request tracing.
pub fn app(state: AppState, service: Service) -> Router {
    let routes = match service {
        Service::Tasks => tasks::router(),
        Service::Expenses => expenses::router(),
    };

    routes
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::test_support::{app_for, send};
    use super::*;

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (app, _db) = app_for(Service::Tasks).await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (app, _db) = app_for(Service::Expenses).await;
        let (status, _) = send(&app, Method::GET, "/api/tasks", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let (app, _db) = app_for(Service::Tasks).await;
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/tasks")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "DELETE")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn malformed_json_is_reported_against_body() {
        let (app, _db) = app_for(Service::Tasks).await;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/tasks")
            .header("content-type", "application/json")
            .body(Body::from("{\"title\": "))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"][0]["field"], "body");
    }

    #[test]
    fn missing_field_is_read_from_serde_message() {
        assert_eq!(missing_field("missing field `title`"), Some("title"));
        assert_eq!(
            missing_field("missing field `expense_date` at line 1 column 2"),
            Some("expense_date")
        );
        assert_eq!(missing_field("expected a string"), None);
    }

    #[tokio::test]
    async fn storage_failure_returns_generic_500() {
        let (app, db) = app_for(Service::Tasks).await;
        db.pool().close().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Unreachable" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "Internal server error" }));
    }
}
