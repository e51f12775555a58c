use std::{cmp::Ordering, sync::Arc};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    domain::{
        aging::{days_overdue, days_since_invoice, is_overdue, AgingFilter, DashboardMetrics},
        models::{Invoice, InvoiceStatus},
    },
    infrastructure::state::AppState,
    validation::rules::validate_payload,
};

use super::errors::ServiceError;

const DEFAULT_PER_PAGE: u32 = 50;
const CHECK_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    InvoiceDate,
    #[default]
    InternalDueDate,
    InvoiceNumber,
    CustomerName,
    InvoiceTotal,
    Balance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilterKind {
    Date,
    Month,
    Year,
}

/// Query-string parameters accepted by the invoice listing and export.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InvoiceQuery {
    #[serde(default)]
    pub filter: AgingFilter,
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub date_filter: Option<DateFilterKind>,
    pub date_value: Option<String>,
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 500))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoiceDateFilter {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl InvoiceDateFilter {
    fn parse(kind: DateFilterKind, value: &str) -> Result<Self, ServiceError> {
        let value = value.trim();
        let invalid = || ServiceError::Validation(format!("invalid date filter value: {value}"));
        match kind {
            DateFilterKind::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(InvoiceDateFilter::Day)
                .map_err(|_| invalid()),
            DateFilterKind::Month => {
                let (year, month) = value.split_once('-').ok_or_else(invalid)?;
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let month = month.parse::<u32>().map_err(|_| invalid())?;
                if !(1..=12).contains(&month) {
                    return Err(invalid());
                }
                Ok(InvoiceDateFilter::Month { year, month })
            }
            DateFilterKind::Year => value
                .parse::<i32>()
                .map(InvoiceDateFilter::Year)
                .map_err(|_| invalid()),
        }
    }

    fn matches(&self, invoice: &Invoice) -> bool {
        let Some(date) = invoice.invoice_date else {
            return false;
        };
        match *self {
            InvoiceDateFilter::Day(day) => date == day,
            InvoiceDateFilter::Month { year, month } => date.year() == year && date.month() == month,
            InvoiceDateFilter::Year(year) => date.year() == year,
        }
    }
}

/// Parsed, validated form of `InvoiceQuery`.
#[derive(Debug, Clone)]
pub struct InvoiceCriteria {
    filter: AgingFilter,
    search: Option<String>,
    date: Option<InvoiceDateFilter>,
    sort_field: SortField,
    sort_order: SortOrder,
}

impl InvoiceCriteria {
    pub fn from_query(query: &InvoiceQuery) -> Result<Self, ServiceError> {
        validate_payload(query)?;
        let date = match (query.date_filter, query.date_value.as_deref()) {
            (Some(kind), Some(value)) if !value.trim().is_empty() => {
                Some(InvoiceDateFilter::parse(kind, value)?)
            }
            _ => None,
        };
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);
        Ok(Self {
            filter: query.filter,
            search,
            date,
            sort_field: query.sort_field,
            sort_order: query.sort_order,
        })
    }

    fn matches(&self, invoice: &Invoice, today: NaiveDate) -> bool {
        if !self.filter.matches(invoice, today) {
            return false;
        }
        if let Some(term) = &self.search {
            let hit = [
                invoice.customer_name.as_deref(),
                invoice.invoice_number.as_deref(),
                invoice.salesperson_name.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(term.as_str()));
            if !hit {
                return false;
            }
        }
        self.date.map_or(true, |date| date.matches(invoice))
    }

    /// Filters then stable-sorts. Missing values sort as zero / empty.
    pub fn apply(&self, invoices: Vec<Invoice>, today: NaiveDate) -> Vec<Invoice> {
        let mut selected: Vec<Invoice> = invoices
            .into_iter()
            .filter(|invoice| self.matches(invoice, today))
            .collect();
        selected.sort_by(|a, b| {
            let ordering = compare_by(self.sort_field, a, b);
            match self.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        selected
    }
}

fn compare_by(field: SortField, a: &Invoice, b: &Invoice) -> Ordering {
    match field {
        SortField::InvoiceDate => a.invoice_date.cmp(&b.invoice_date),
        SortField::InternalDueDate => a.internal_due_date.cmp(&b.internal_due_date),
        SortField::InvoiceNumber => compare_text(&a.invoice_number, &b.invoice_number),
        SortField::CustomerName => compare_text(&a.customer_name, &b.customer_name),
        SortField::InvoiceTotal => compare_amount(a.invoice_total, b.invoice_total),
        SortField::Balance => compare_amount(a.balance, b.balance),
    }
}

fn compare_text(a: &Option<String>, b: &Option<String>) -> Ordering {
    let a = a.as_deref().unwrap_or_default();
    let b = b.as_deref().unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_amount(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(0.0)
        .partial_cmp(&b.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

#[derive(Debug, Serialize)]
pub struct InvoiceListing {
    pub invoices: Vec<Invoice>,
    pub total: usize,
    pub unfiltered_total: usize,
    pub page: u32,
    pub per_page: u32,
    pub metrics: DashboardMetrics,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceSample {
    pub invoice_number: Option<String>,
    pub customer_name: Option<String>,
    pub zoho_invoice_id: String,
}

#[derive(Debug, Serialize)]
pub struct StoreCheck {
    pub success: bool,
    pub count: usize,
    pub sample: Vec<InvoiceSample>,
    pub has_customer_names: bool,
}

pub struct CsvExport {
    pub filename: String,
    pub body: Vec<u8>,
    pub rows: usize,
}

const CSV_HEADERS: [&str; 13] = [
    "Invoice No",
    "Customer Name",
    "Customer Email",
    "Customer Phone",
    "Salesperson Name",
    "Zoho Status",
    "Invoice Date",
    "Internal Due Date",
    "Total",
    "Balance",
    "Age (days)",
    "Days Overdue",
    "Status",
];

/// Read side of the dashboard.
pub struct InvoiceService {
    state: Arc<AppState>,
}

impl InvoiceService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn unpaid(&self) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self
            .state
            .store
            .list_with_status(InvoiceStatus::Unpaid)
            .await?)
    }

    pub async fn list(
        &self,
        query: &InvoiceQuery,
        today: NaiveDate,
    ) -> Result<InvoiceListing, ServiceError> {
        let criteria = InvoiceCriteria::from_query(query)?;
        let invoices = self.unpaid().await?;
        let unfiltered_total = invoices.len();
        let selected = criteria.apply(invoices, today);
        let metrics = DashboardMetrics::compute(&selected, today);
        let last_synced_at = self.state.store.last_synced_at().await?;

        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let total = selected.len();
        let offset = (page as usize - 1).saturating_mul(per_page as usize);
        let invoices = selected
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();

        Ok(InvoiceListing {
            invoices,
            total,
            unfiltered_total,
            page,
            per_page,
            metrics,
            last_synced_at,
        })
    }

    /// Unpaid invoices whose internal due date has passed, oldest due first.
    pub async fn overdue(&self, today: NaiveDate) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self
            .unpaid()
            .await?
            .into_iter()
            .filter(|invoice| is_overdue(invoice, today))
            .collect())
    }

    pub async fn check(&self) -> Result<StoreCheck, ServiceError> {
        let sample: Vec<InvoiceSample> = self
            .unpaid()
            .await?
            .into_iter()
            .take(CHECK_SAMPLE_SIZE)
            .map(|invoice| InvoiceSample {
                invoice_number: invoice.invoice_number,
                customer_name: invoice.customer_name,
                zoho_invoice_id: invoice.zoho_invoice_id,
            })
            .collect();
        let has_customer_names = sample
            .iter()
            .any(|row| row.customer_name.as_deref().is_some_and(|name| !name.is_empty()));
        Ok(StoreCheck {
            success: true,
            count: sample.len(),
            sample,
            has_customer_names,
        })
    }

    pub async fn export_csv(
        &self,
        query: &InvoiceQuery,
        today: NaiveDate,
    ) -> Result<CsvExport, ServiceError> {
        let criteria = InvoiceCriteria::from_query(query)?;
        let selected = criteria.apply(self.unpaid().await?, today);
        if selected.is_empty() {
            return Err(ServiceError::Validation("No invoices to export".to_string()));
        }
        let body = render_csv(&selected, today)?;
        Ok(CsvExport {
            filename: format!("invoices-{}.csv", today.format("%Y-%m-%d")),
            body,
            rows: selected.len(),
        })
    }
}

pub fn render_csv(invoices: &[Invoice], today: NaiveDate) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS).map_err(csv_error)?;
    for invoice in invoices {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let date = |value: Option<NaiveDate>| {
            value
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        writer
            .write_record([
                text(&invoice.invoice_number),
                text(&invoice.customer_name),
                text(&invoice.customer_email),
                text(&invoice.customer_phone),
                text(&invoice.salesperson_name),
                text(&invoice.zoho_status),
                date(invoice.invoice_date),
                date(invoice.internal_due_date),
                format!("{:.2}", invoice.invoice_total.unwrap_or(0.0)),
                format!("{:.2}", invoice.balance.unwrap_or(0.0)),
                days_since_invoice(invoice, today).to_string(),
                days_overdue(invoice, today).to_string(),
                invoice.status.as_str().to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|err| ServiceError::Internal(err.to_string()))
}

fn csv_error(err: csv::Error) -> ServiceError {
    ServiceError::Internal(err.to_string())
}
