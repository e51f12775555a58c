use axum::{routing::get, Json, Router};

use crate::services::errors::{ServiceError, SyncError};

pub mod health;
pub mod invoices;
pub mod sync;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/sync", sync::router())
        .nest("/invoices", invoices::router())
}

pub(crate) type ErrorResponse = (axum::http::StatusCode, Json<serde_json::Value>);

pub(crate) fn to_response(err: ServiceError) -> ErrorResponse {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": err.to_string() })),
    )
}

pub(crate) fn sync_failure(err: &SyncError) -> ErrorResponse {
    (
        err.status_code(),
        Json(serde_json::json!({ "success": false, "error": err.to_string() })),
    )
}
