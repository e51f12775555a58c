//! Aging arithmetic relative to a caller-supplied `today`.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::Invoice;

/// Invoices due within this many days (inclusive) count as "due soon".
pub const DUE_SOON_DAYS: i64 = 5;

pub fn is_overdue(invoice: &Invoice, today: NaiveDate) -> bool {
    invoice
        .internal_due_date
        .map(|due| due < today)
        .unwrap_or(false)
}

/// `None` when the invoice carries no internal due date.
pub fn days_until_due(invoice: &Invoice, today: NaiveDate) -> Option<i64> {
    invoice
        .internal_due_date
        .map(|due| (due - today).num_days())
}

pub fn days_since_invoice(invoice: &Invoice, today: NaiveDate) -> i64 {
    invoice
        .invoice_date
        .map(|date| (today - date).num_days())
        .unwrap_or(0)
}

pub fn days_overdue(invoice: &Invoice, today: NaiveDate) -> i64 {
    days_until_due(invoice, today)
        .map(|days| (-days).max(0))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgingFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "overdue")]
    Overdue,
    #[serde(rename = "due-1-5")]
    DueSoon,
    #[serde(rename = "due-6-30")]
    DueLater,
}

impl AgingFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgingFilter::All => "all",
            AgingFilter::Overdue => "overdue",
            AgingFilter::DueSoon => "due-1-5",
            AgingFilter::DueLater => "due-6-30",
        }
    }

    pub fn matches(&self, invoice: &Invoice, today: NaiveDate) -> bool {
        match self {
            AgingFilter::All => true,
            AgingFilter::Overdue => is_overdue(invoice, today),
            AgingFilter::DueSoon => days_until_due(invoice, today)
                .map(|days| (0..=DUE_SOON_DAYS).contains(&days))
                .unwrap_or(false),
            AgingFilter::DueLater => days_until_due(invoice, today)
                .map(|days| (DUE_SOON_DAYS + 1..=30).contains(&days))
                .unwrap_or(false),
        }
    }
}

impl FromStr for AgingFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(AgingFilter::All),
            "overdue" => Ok(AgingFilter::Overdue),
            "due-1-5" => Ok(AgingFilter::DueSoon),
            "due-6-30" => Ok(AgingFilter::DueLater),
            other => Err(format!("unknown aging filter: {other}")),
        }
    }
}

/// Headline figures shown above the invoice table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total_count: usize,
    pub total_outstanding: f64,
    pub overdue_count: usize,
    pub overdue_amount: f64,
    pub due_soon_count: usize,
    pub due_soon_amount: f64,
}

impl DashboardMetrics {
    pub fn compute<'a, I>(invoices: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a Invoice>,
    {
        let mut metrics = DashboardMetrics::default();
        for invoice in invoices {
            let balance = invoice.balance.unwrap_or(0.0);
            metrics.total_count += 1;
            metrics.total_outstanding += balance;
            if is_overdue(invoice, today) {
                metrics.overdue_count += 1;
                metrics.overdue_amount += balance;
            }
            if AgingFilter::DueSoon.matches(invoice, today) {
                metrics.due_soon_count += 1;
                metrics.due_soon_amount += balance;
            }
        }
        metrics
    }
}
