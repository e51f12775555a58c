use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    infrastructure::state::AppState,
    services::invoices::{InvoiceListing, InvoiceQuery, InvoiceService, StoreCheck},
};

use super::{to_response, ErrorResponse};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/overdue", get(list_overdue))
        .route("/check", get(check_store))
        .route("/export.csv", get(export_csv))
}

async fn list_invoices(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<InvoiceListing>, ErrorResponse> {
    let service = InvoiceService::new(state);
    let listing = service
        .list(&query, Utc::now().date_naive())
        .await
        .map_err(to_response)?;
    Ok(Json(listing))
}

async fn list_overdue(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ErrorResponse> {
    let service = InvoiceService::new(state);
    let invoices = service
        .overdue(Utc::now().date_naive())
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "count": invoices.len(), "invoices": invoices })))
}

async fn check_store(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<StoreCheck>, ErrorResponse> {
    let service = InvoiceService::new(state);
    let check = service.check().await.map_err(to_response)?;
    Ok(Json(check))
}

async fn export_csv(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Response, ErrorResponse> {
    let service = InvoiceService::new(state);
    let export = service
        .export_csv(&query, Utc::now().date_naive())
        .await
        .map_err(to_response)?;
    info!(rows = export.rows, filename = %export.filename, "exported invoices");

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}
