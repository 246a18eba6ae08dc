mod page_data;
mod products;
mod search;
mod statistics;

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use pagevault_db::{Deadline, DbError, ErrorKind, Store};
use rust_decimal::Decimal;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

/// Largest page size a client may request.
pub(super) const MAX_PER_PAGE: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Budget for each store call made on behalf of a request.
    pub request_timeout: Duration,
}

impl AppState {
    pub(super) fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(super) fn validation(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "timeout" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Translates a store failure into the wire error taxonomy.
///
/// Only storage failures are logged; the other kinds are the caller's
/// concern and carry their own message.
pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error.kind() {
        ErrorKind::Validation => ApiError::validation(request_id, error.to_string()),
        ErrorKind::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        ErrorKind::Conflict => {
            ApiError::new(request_id, "conflict", "conflicting write, retry the request")
        }
        ErrorKind::Storage if matches!(error, DbError::DeadlineExceeded) => {
            tracing::warn!("store call exceeded the request deadline");
            ApiError::new(request_id, "timeout", "storage did not respond in time")
        }
        ErrorKind::Storage => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Parses an optional integer query value, treating junk as absent.
pub(super) fn lenient_i64(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}

/// Parses an optional decimal query value, treating junk as absent.
pub(super) fn lenient_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|v| v.trim().parse().ok())
}

/// `true`/`1` (any case) are true; everything else, including absence, is false.
pub(super) fn flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Trimmed, non-empty query value.
pub(super) fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::USER_AGENT,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/page-data",
            get(page_data::get_page_data).post(page_data::create_page_data),
        )
        .route(
            "/api/v1/page-data/history",
            get(page_data::page_history),
        )
        .route(
            "/api/v1/page-data/{id}",
            axum::routing::delete(page_data::delete_page_data),
        )
        .route("/api/v1/search/products", get(search::search_products))
        .route("/api/v1/statistics", get(statistics::get_statistics))
        .route("/api/v1/product", get(products::get_product))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.store.health_check(state.deadline()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
