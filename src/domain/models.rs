use std::{convert::TryFrom, fmt, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    decode::Decode,
    encode::{Encode, IsNull},
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    FromRow, Postgres, Type,
};
use thiserror::Error;
use uuid::Uuid;

/// Calendar days added to the invoice date to derive the internal due date.
pub const INTERNAL_DUE_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvoiceStatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "paid" => Ok(InvoiceStatus::Paid),
            _ => Err(InvoiceStatusParseError {
                value: value.to_owned(),
            }),
        }
    }
}

impl TryFrom<&str> for InvoiceStatus {
    type Error = InvoiceStatusParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Type<Postgres> for InvoiceStatus {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as Type<Postgres>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Postgres> for InvoiceStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        let value = self.as_str();
        <&str as Encode<Postgres>>::encode_by_ref(&value, buf)
    }

    fn size_hint(&self) -> usize {
        let value = self.as_str();
        <&str as Encode<Postgres>>::size_hint(&value)
    }
}

impl<'r> Decode<'r, Postgres> for InvoiceStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        InvoiceStatus::try_from(raw).map_err(|err| Box::new(err) as BoxDynError)
    }
}

#[derive(Debug, Clone, Error)]
#[error("unsupported invoice status: {value}")]
pub struct InvoiceStatusParseError {
    value: String,
}

/// A fully unpaid invoice as reported by the accounting provider, after
/// field normalization. Lives for a single sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub invoice_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub salesperson_name: Option<String>,
    pub status: String,
    pub invoice_number: String,
    pub invoice_date: String,
    pub total: f64,
    pub balance: f64,
}

/// Row of the `invoices` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub zoho_invoice_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub salesperson_name: Option<String>,
    pub zoho_status: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_total: Option<f64>,
    pub balance: Option<f64>,
    pub internal_due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Upsert payload keyed by `zoho_invoice_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub zoho_invoice_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub salesperson_name: Option<String>,
    pub zoho_status: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub invoice_total: f64,
    pub balance: f64,
    pub internal_due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invoice {invoice_id} has an unusable invoice date {value:?}")]
pub struct InvoiceDateError {
    pub invoice_id: String,
    pub value: String,
}

impl NewInvoice {
    pub fn from_remote(
        remote: &RemoteInvoice,
        due_in_days: i64,
        synced_at: DateTime<Utc>,
    ) -> Result<Self, InvoiceDateError> {
        let date_error = || InvoiceDateError {
            invoice_id: remote.invoice_id.clone(),
            value: remote.invoice_date.clone(),
        };
        let invoice_date = parse_invoice_date(&remote.invoice_date).ok_or_else(date_error)?;
        let internal_due_date =
            internal_due_date(invoice_date, due_in_days).ok_or_else(date_error)?;

        Ok(Self {
            zoho_invoice_id: remote.invoice_id.clone(),
            customer_name: remote.customer_name.clone(),
            customer_email: remote.customer_email.clone(),
            customer_phone: remote.customer_phone.clone(),
            salesperson_name: remote.salesperson_name.clone(),
            zoho_status: remote.status.clone(),
            invoice_number: remote.invoice_number.clone(),
            invoice_date,
            invoice_total: remote.total,
            balance: remote.balance,
            internal_due_date,
            status: InvoiceStatus::Unpaid,
            last_synced_at: synced_at,
        })
    }
}

/// Plain calendar arithmetic: no month-end or business-day adjustment.
pub fn internal_due_date(invoice_date: NaiveDate, days: i64) -> Option<NaiveDate> {
    invoice_date.checked_add_signed(Duration::days(days))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_invoice_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|ts| ts.date_naive())
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub added_count: u64,
    pub removed_count: u64,
    pub total_unpaid: u64,
}
