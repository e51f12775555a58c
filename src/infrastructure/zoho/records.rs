//! Raw Zoho Books invoice records and their normalization.
//!
//! Customer contact fields show up in different places depending on how the
//! invoice was created, so each one is resolved through a fixed priority
//! list and the first non-blank value wins.

use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DeserializeAs, DisplayFromStr, PickFirst};

use crate::domain::models::RemoteInvoice;

/// Balance and total may differ by this much and still count as equal.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

const DEFAULT_REMOTE_STATUS: &str = "Sent";

/// Reads a string, number or boolean as text. Anything else is an error,
/// which `DefaultOnError` turns into `None`.
pub struct ScalarText;

impl<'de> DeserializeAs<'de, String> for ScalarText {
    fn deserialize_as<D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            other => Err(D::Error::custom(format!("expected text, got {other}"))),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawInvoice {
    pub invoice_id: Option<Value>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub invoice_number: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub customer_name: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub company_name: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub email: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub phone: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub status: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub date: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub invoice_date: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub salesperson_name: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    pub customer: RawCustomer,
    #[serde_as(as = "DefaultOnError")]
    pub contact_persons: Vec<RawContactPerson>,
    #[serde_as(as = "DefaultOnError")]
    pub billing_address: RawBillingAddress,
    #[serde_as(as = "DefaultOnError")]
    pub salesperson: RawSalesperson,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub total: Option<f64>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub balance: Option<f64>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCustomer {
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub customer_name: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub name: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub email: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub phone: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawContactPerson {
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub email: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub phone: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBillingAddress {
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub attention: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub email: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub phone: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSalesperson {
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub name: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<ScalarText>>")]
    pub salesperson_name: Option<String>,
}

impl RawInvoice {
    pub fn total_amount(&self) -> f64 {
        self.total.unwrap_or(0.0)
    }

    pub fn balance_amount(&self) -> f64 {
        self.balance.unwrap_or(0.0)
    }

    /// Positive balance equal to the total: nothing has been paid yet.
    /// Partially paid invoices are excluded.
    pub fn is_fully_unpaid(&self) -> bool {
        let balance = self.balance_amount();
        balance > 0.0 && (balance - self.total_amount()).abs() < AMOUNT_TOLERANCE
    }

    pub fn external_id(&self) -> String {
        match &self.invoice_id {
            Some(Value::String(id)) => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        }
    }

    pub fn resolved_customer_name(&self) -> String {
        first_non_blank([
            self.customer_name.as_deref(),
            self.customer.customer_name.as_deref(),
            self.customer.name.as_deref(),
            self.company_name.as_deref(),
            self.billing_address.attention.as_deref(),
        ])
        .unwrap_or_default()
    }

    pub fn resolved_email(&self) -> Option<String> {
        let primary = self.contact_persons.first();
        first_non_blank([
            self.email.as_deref(),
            self.customer.email.as_deref(),
            primary.and_then(|contact| contact.email.as_deref()),
            self.billing_address.email.as_deref(),
        ])
    }

    pub fn resolved_phone(&self) -> Option<String> {
        let primary = self.contact_persons.first();
        first_non_blank([
            self.phone.as_deref(),
            self.customer.phone.as_deref(),
            primary.and_then(|contact| contact.phone.as_deref()),
            self.billing_address.phone.as_deref(),
        ])
    }

    pub fn resolved_salesperson(&self) -> Option<String> {
        first_non_blank([
            self.salesperson.name.as_deref(),
            self.salesperson.salesperson_name.as_deref(),
            self.salesperson_name.as_deref(),
        ])
    }

    pub fn normalize(&self) -> RemoteInvoice {
        RemoteInvoice {
            invoice_id: self.external_id(),
            customer_name: self.resolved_customer_name(),
            customer_email: self.resolved_email(),
            customer_phone: self.resolved_phone(),
            salesperson_name: self.resolved_salesperson(),
            status: first_non_blank([self.status.as_deref()])
                .unwrap_or_else(|| DEFAULT_REMOTE_STATUS.to_string()),
            invoice_number: self.invoice_number.clone().unwrap_or_default(),
            invoice_date: first_non_blank([self.date.as_deref(), self.invoice_date.as_deref()])
                .unwrap_or_default(),
            total: self.total_amount(),
            balance: self.balance_amount(),
        }
    }
}

fn first_non_blank<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}
