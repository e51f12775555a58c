use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Extension, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use invoice_aging::{
    api,
    domain::models::{Invoice, InvoiceStatus, RemoteInvoice},
    infrastructure::{
        config::{Config, StoreConfig},
        state::AppState,
        store::MemoryInvoiceStore,
        zoho::{AccessToken, InvoiceProvider},
    },
    services::{errors::SyncError, progress::ProgressSink},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

struct StaticProvider {
    invoices: Vec<RemoteInvoice>,
    reject_token: bool,
}

#[async_trait]
impl InvoiceProvider for StaticProvider {
    async fn access_token(&self) -> Result<AccessToken, SyncError> {
        if self.reject_token {
            return Err(SyncError::credential_status(401, "invalid_code"));
        }
        Ok(AccessToken::new("token"))
    }

    async fn fetch_unpaid_invoices(
        &self,
        _token: &AccessToken,
        _progress: &dyn ProgressSink,
    ) -> Result<Vec<RemoteInvoice>, SyncError> {
        Ok(self.invoices.clone())
    }
}

fn remote(id: &str, invoice_date: NaiveDate) -> RemoteInvoice {
    RemoteInvoice {
        invoice_id: id.to_string(),
        customer_name: format!("Customer {id}"),
        customer_email: None,
        customer_phone: None,
        salesperson_name: None,
        status: "Sent".to_string(),
        invoice_number: format!("INV-{id}"),
        invoice_date: invoice_date.format("%Y-%m-%d").to_string(),
        total: 100.0,
        balance: 100.0,
    }
}

fn stored(id: &str, invoice_date: NaiveDate, balance: f64) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        zoho_invoice_id: id.to_string(),
        customer_name: Some(format!("Customer {id}")),
        customer_email: None,
        customer_phone: None,
        salesperson_name: Some("Dana".to_string()),
        zoho_status: Some("Sent".to_string()),
        invoice_number: Some(format!("INV-{id}")),
        invoice_date: Some(invoice_date),
        invoice_total: Some(balance),
        balance: Some(balance),
        internal_due_date: Some(invoice_date + Duration::days(30)),
        status: InvoiceStatus::Unpaid,
        last_synced_at: Some(Utc::now()),
    }
}

fn memory_config() -> Arc<Config> {
    Arc::new(Config {
        store: StoreConfig {
            provider: "memory".to_string(),
        },
        ..Config::default()
    })
}

fn app(store: Arc<MemoryInvoiceStore>, provider: StaticProvider) -> Router {
    let config = memory_config();
    let state = Arc::new(AppState::new(Arc::clone(&config), store, Arc::new(provider)));
    api::build_router(config).layer(Extension(state))
}

fn seeded_store() -> Arc<MemoryInvoiceStore> {
    let today = Utc::now().date_naive();
    Arc::new(MemoryInvoiceStore::with_invoices([
        stored("old", today - Duration::days(45), 500.0),
        stored("soon", today - Duration::days(27), 80.0),
        stored("fresh", today - Duration::days(2), 20.0),
    ]))
}

fn idle_provider() -> StaticProvider {
    StaticProvider {
        invoices: Vec::new(),
        reject_token: false,
    }
}

async fn get_json(app: Router, uri: &str) -> Result<(StatusCode, Value)> {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&body)?))
}

async fn post(app: Router, uri: &str) -> Result<(StatusCode, Vec<u8>)> {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())?,
        )
        .await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, body.to_vec()))
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let (status, body) = get_json(app(seeded_store(), idle_provider()), "/api/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn unknown_routes_return_not_found_json() -> Result<()> {
    let (status, body) = get_json(app(seeded_store(), idle_provider()), "/api/nope").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    Ok(())
}

#[tokio::test]
async fn manual_sync_reconciles_and_reports_stats() -> Result<()> {
    let today = Utc::now().date_naive();
    let store = seeded_store();
    let provider = StaticProvider {
        invoices: vec![remote("old", today - Duration::days(45)), remote("new", today)],
        reject_token: false,
    };

    let (status, body) = post(app(Arc::clone(&store), provider), "/api/sync").await?;
    let body: Value = serde_json::from_slice(&body)?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["addedCount"], 1);
    assert_eq!(body["stats"]["removedCount"], 2);
    assert_eq!(body["stats"]["totalUnpaid"], 2);
    assert!(body["timestamp"].is_string());

    let mut ids: Vec<String> = store
        .snapshot()
        .into_iter()
        .map(|invoice| invoice.zoho_invoice_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);
    Ok(())
}

#[tokio::test]
async fn failed_sync_returns_error_and_keeps_rows() -> Result<()> {
    let store = seeded_store();
    let provider = StaticProvider {
        invoices: Vec::new(),
        reject_token: true,
    };

    let (status, body) = post(app(Arc::clone(&store), provider), "/api/sync").await?;
    let body: Value = serde_json::from_slice(&body)?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("authentication failed"));
    assert_eq!(store.snapshot().len(), 3);
    Ok(())
}

#[tokio::test]
async fn streamed_sync_ends_with_terminal_frame() -> Result<()> {
    let today = Utc::now().date_naive();
    let provider = StaticProvider {
        invoices: vec![remote("only", today)],
        reject_token: false,
    };

    let (status, body) = post(app(seeded_store(), provider), "/api/sync/stream").await?;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body)?;
    let frames: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    assert!(frames.len() > 2);
    assert_eq!(frames[0]["message"], "Getting Zoho access token...");
    let last = frames.last().expect("terminal frame");
    assert_eq!(last["success"], true);
    assert_eq!(last["message"], "Sync completed successfully!");
    assert_eq!(last["progress"], 100);
    assert_eq!(last["stats"]["totalUnpaid"], 1);
    Ok(())
}

#[tokio::test]
async fn listing_filters_paginates_and_reports_totals() -> Result<()> {
    let (status, body) = get_json(
        app(seeded_store(), idle_provider()),
        "/api/invoices?filter=all&sort_field=balance&sort_order=desc&per_page=2&page=1",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["unfiltered_total"], 3);
    assert_eq!(body["per_page"], 2);
    let invoices = body["invoices"].as_array().expect("invoices array");
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0]["zoho_invoice_id"], "old");
    assert_eq!(invoices[1]["zoho_invoice_id"], "soon");
    assert_eq!(body["metrics"]["overdue_count"], 1);
    assert_eq!(body["metrics"]["due_soon_count"], 1);

    let (_, overdue) = get_json(
        app(seeded_store(), idle_provider()),
        "/api/invoices?filter=overdue",
    )
    .await?;
    assert_eq!(overdue["total"], 1);
    assert_eq!(overdue["unfiltered_total"], 3);
    Ok(())
}

#[tokio::test]
async fn listing_rejects_out_of_range_page_size() -> Result<()> {
    let (status, body) = get_json(
        app(seeded_store(), idle_provider()),
        "/api/invoices?per_page=0",
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("per_page"));
    Ok(())
}

#[tokio::test]
async fn overdue_and_check_endpoints_summarize_the_mirror() -> Result<()> {
    let (status, overdue) = get_json(
        app(seeded_store(), idle_provider()),
        "/api/invoices/overdue",
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue["count"], 1);
    assert_eq!(overdue["invoices"][0]["zoho_invoice_id"], "old");

    let (status, check) = get_json(
        app(seeded_store(), idle_provider()),
        "/api/invoices/check",
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["count"], 3);
    assert_eq!(check["has_customer_names"], true);
    Ok(())
}

#[tokio::test]
async fn export_returns_csv_attachment() -> Result<()> {
    let response = app(seeded_store(), idle_provider())
        .oneshot(
            Request::builder()
                .uri("/api/invoices/export.csv?search=fresh")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()?
        .starts_with("attachment; filename=\"invoices-"));

    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let text = String::from_utf8(body.to_vec())?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Invoice No,Customer Name"));
    assert!(lines[1].starts_with("INV-fresh,Customer fresh"));
    Ok(())
}
