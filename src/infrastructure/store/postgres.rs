use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::InvoiceStore;
use crate::{
    domain::models::{Invoice, InvoiceStatus, NewInvoice},
    infrastructure::db::PgPool,
};

pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn external_ids_with_status(
        &self,
        status: InvoiceStatus,
    ) -> anyhow::Result<HashSet<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT zoho_invoice_id FROM invoices WHERE status = $1",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn upsert(&self, invoice: &NewInvoice) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, zoho_invoice_id, customer_name, customer_email, customer_phone,
                salesperson_name, zoho_status, invoice_number, invoice_date,
                invoice_total, balance, internal_due_date, status, last_synced_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            ON CONFLICT (zoho_invoice_id) DO UPDATE SET
                customer_name = EXCLUDED.customer_name,
                customer_email = EXCLUDED.customer_email,
                customer_phone = EXCLUDED.customer_phone,
                salesperson_name = EXCLUDED.salesperson_name,
                zoho_status = EXCLUDED.zoho_status,
                invoice_number = EXCLUDED.invoice_number,
                invoice_date = EXCLUDED.invoice_date,
                invoice_total = EXCLUDED.invoice_total,
                balance = EXCLUDED.balance,
                internal_due_date = EXCLUDED.internal_due_date,
                status = EXCLUDED.status,
                last_synced_at = EXCLUDED.last_synced_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&invoice.zoho_invoice_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_phone)
        .bind(&invoice.salesperson_name)
        .bind(&invoice.zoho_status)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(invoice.invoice_total)
        .bind(invoice.balance)
        .bind(invoice.internal_due_date)
        .bind(invoice.status)
        .bind(invoice.last_synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_by_external_ids(&self, ids: &[String]) -> anyhow::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM invoices WHERE zoho_invoice_id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_with_status(&self, status: InvoiceStatus) -> anyhow::Result<u64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM invoices WHERE status = $1")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn list_with_status(&self, status: InvoiceStatus) -> anyhow::Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, zoho_invoice_id, customer_name, customer_email, customer_phone,
                   salesperson_name, zoho_status, invoice_number, invoice_date,
                   invoice_total, balance, internal_due_date, status, last_synced_at
            FROM invoices
            WHERE status = $1
            ORDER BY internal_due_date ASC NULLS LAST, zoho_invoice_id ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(last_synced_at) FROM invoices",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }
}
