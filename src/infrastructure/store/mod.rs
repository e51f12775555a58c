use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::models::{Invoice, InvoiceStatus, NewInvoice},
    infrastructure::{config::Config, db},
};

mod postgres;

pub use postgres::PgInvoiceStore;

/// Persistence surface for the mirrored invoice table, keyed by the
/// provider's invoice id.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn external_ids_with_status(&self, status: InvoiceStatus)
        -> anyhow::Result<HashSet<String>>;
    async fn upsert(&self, invoice: &NewInvoice) -> anyhow::Result<()>;
    async fn delete_by_external_ids(&self, ids: &[String]) -> anyhow::Result<u64>;
    async fn count_with_status(&self, status: InvoiceStatus) -> anyhow::Result<u64>;
    /// Ordered by internal due date ascending, undated rows last.
    async fn list_with_status(&self, status: InvoiceStatus) -> anyhow::Result<Vec<Invoice>>;
    async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>>;
}

pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn InvoiceStore>> {
    match config.store.provider.as_str() {
        "postgres" => {
            let pool = db::connect(&config.database).await?;
            db::run_migrations(&pool).await?;
            info!("database migrations completed successfully");
            Ok(Arc::new(PgInvoiceStore::new(pool)))
        }
        "memory" => Ok(Arc::new(MemoryInvoiceStore::default())),
        other => anyhow::bail!("unsupported store provider: {other}"),
    }
}

#[derive(Default)]
pub struct MemoryInvoiceStore {
    invoices: RwLock<HashMap<String, Invoice>>,
}

impl MemoryInvoiceStore {
    /// Seeds rows directly, bypassing the upsert path.
    pub fn with_invoices(invoices: impl IntoIterator<Item = Invoice>) -> Self {
        let invoices = invoices
            .into_iter()
            .map(|invoice| (invoice.zoho_invoice_id.clone(), invoice))
            .collect();
        Self {
            invoices: RwLock::new(invoices),
        }
    }

    pub fn snapshot(&self) -> Vec<Invoice> {
        let mut rows: Vec<Invoice> = self.invoices.read().values().cloned().collect();
        sort_by_due_date(&mut rows);
        rows
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn external_ids_with_status(
        &self,
        status: InvoiceStatus,
    ) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .invoices
            .read()
            .values()
            .filter(|invoice| invoice.status == status)
            .map(|invoice| invoice.zoho_invoice_id.clone())
            .collect())
    }

    async fn upsert(&self, invoice: &NewInvoice) -> anyhow::Result<()> {
        let mut invoices = self.invoices.write();
        let id = invoices
            .get(&invoice.zoho_invoice_id)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        invoices.insert(
            invoice.zoho_invoice_id.clone(),
            Invoice {
                id,
                zoho_invoice_id: invoice.zoho_invoice_id.clone(),
                customer_name: Some(invoice.customer_name.clone()),
                customer_email: invoice.customer_email.clone(),
                customer_phone: invoice.customer_phone.clone(),
                salesperson_name: invoice.salesperson_name.clone(),
                zoho_status: Some(invoice.zoho_status.clone()),
                invoice_number: Some(invoice.invoice_number.clone()),
                invoice_date: Some(invoice.invoice_date),
                invoice_total: Some(invoice.invoice_total),
                balance: Some(invoice.balance),
                internal_due_date: Some(invoice.internal_due_date),
                status: invoice.status,
                last_synced_at: Some(invoice.last_synced_at),
            },
        );
        Ok(())
    }

    async fn delete_by_external_ids(&self, ids: &[String]) -> anyhow::Result<u64> {
        let mut invoices = self.invoices.write();
        let removed = ids
            .iter()
            .filter(|id| invoices.remove(id.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn count_with_status(&self, status: InvoiceStatus) -> anyhow::Result<u64> {
        Ok(self
            .invoices
            .read()
            .values()
            .filter(|invoice| invoice.status == status)
            .count() as u64)
    }

    async fn list_with_status(&self, status: InvoiceStatus) -> anyhow::Result<Vec<Invoice>> {
        let mut rows: Vec<Invoice> = self
            .invoices
            .read()
            .values()
            .filter(|invoice| invoice.status == status)
            .cloned()
            .collect();
        sort_by_due_date(&mut rows);
        Ok(rows)
    }

    async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self
            .invoices
            .read()
            .values()
            .filter_map(|invoice| invoice.last_synced_at)
            .max())
    }
}

fn sort_by_due_date(rows: &mut [Invoice]) {
    rows.sort_by(|a, b| {
        let due = match (a.internal_due_date, b.internal_due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        due.then_with(|| a.zoho_invoice_id.cmp(&b.zoho_invoice_id))
    });
}
