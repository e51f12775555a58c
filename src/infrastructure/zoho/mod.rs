//! Zoho Books client: OAuth refresh-token exchange and unpaid invoice listing.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    domain::models::RemoteInvoice,
    infrastructure::config::ZohoConfig,
    services::{
        errors::SyncError,
        progress::{report, ProgressSink},
    },
};

pub mod pagination;
pub mod records;

use pagination::{PageStep, Paginator};
use records::RawInvoice;

/// Zoho caps `per_page` at 200.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Source of the remote unpaid invoice set.
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, SyncError>;

    async fn fetch_unpaid_invoices(
        &self,
        token: &AccessToken,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<RemoteInvoice>, SyncError>;
}

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: None,
            expires_in: None,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Clone)]
pub struct ZohoCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub organization_id: String,
}

impl ZohoCredentials {
    pub fn from_config(config: &ZohoConfig) -> Result<Self, SyncError> {
        let fields = [
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("refresh_token", &config.refresh_token),
            ("organization_id", &config.organization_id),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::Configuration(format!(
                "Missing Zoho credentials: {}",
                missing.join(", ")
            )));
        }

        let value = |slot: &Option<String>| slot.as_deref().unwrap_or_default().trim().to_string();
        Ok(Self {
            client_id: value(&config.client_id),
            client_secret: value(&config.client_secret),
            refresh_token: value(&config.refresh_token),
            organization_id: value(&config.organization_id),
        })
    }
}

impl fmt::Debug for ZohoCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZohoCredentials")
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct InvoicePage {
    code: Option<i64>,
    message: Option<String>,
    #[serde(default)]
    invoices: Vec<Value>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    page_context: PageContext,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct PageContext {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    has_more_page: bool,
}

#[derive(Clone)]
pub struct ZohoClient {
    http: reqwest::Client,
    credentials: ZohoCredentials,
    token_url: String,
    invoices_url: String,
    page_size: u32,
    max_pages: u32,
}

impl ZohoClient {
    /// Validates credentials and endpoints up front so a misconfigured
    /// deployment fails at startup rather than on the first sync.
    pub fn new(config: &ZohoConfig) -> Result<Self, SyncError> {
        let credentials = ZohoCredentials::from_config(config)?;
        let token_url = endpoint(&config.accounts_url, "oauth/v2/token")?;
        let invoices_url = endpoint(&config.api_base_url, "invoices")?;

        if !(1..=MAX_PAGE_SIZE).contains(&config.page_size) {
            return Err(SyncError::Configuration(format!(
                "zoho.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                config.page_size
            )));
        }
        if config.max_pages == 0 {
            return Err(SyncError::Configuration(
                "zoho.max_pages must be at least 1".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(format!("invoice-aging/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| SyncError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            credentials,
            token_url,
            invoices_url,
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    async fn fetch_page(&self, token: &AccessToken, page: u32) -> Result<InvoicePage, SyncError> {
        let per_page = self.page_size.to_string();
        let page = page.to_string();
        let response = self
            .http
            .get(&self.invoices_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Zoho-oauthtoken {}", token.token),
            )
            .query(&[
                ("organization_id", self.credentials.organization_id.as_str()),
                ("status", "unpaid"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
                ("sort_column", "date"),
                ("sort_order", "D"),
            ])
            .send()
            .await
            .map_err(SyncError::remote_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(SyncError::remote_transport)?;
        if !status.is_success() {
            return Err(SyncError::remote_status(status.as_u16(), body));
        }

        let page_body: InvoicePage = serde_json::from_str(&body)
            .map_err(|err| SyncError::remote_payload(status.as_u16(), err))?;
        if page_body.code != Some(0) {
            return Err(SyncError::remote_code(
                page_body.code,
                page_body.message.as_deref(),
            ));
        }
        Ok(page_body)
    }
}

#[async_trait]
impl InvoiceProvider for ZohoClient {
    async fn access_token(&self) -> Result<AccessToken, SyncError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(SyncError::credential_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(SyncError::credential_transport)?;
        if !status.is_success() {
            return Err(SyncError::credential_status(status.as_u16(), body));
        }

        let parsed: TokenResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Err(SyncError::credential_payload(status.as_u16(), body)),
        };
        match parsed.access_token {
            Some(token) if !token.trim().is_empty() => {
                debug!(expires_in = ?parsed.expires_in, "obtained zoho access token");
                Ok(AccessToken {
                    token,
                    token_type: parsed.token_type,
                    expires_in: parsed.expires_in,
                })
            }
            _ => Err(SyncError::credential_payload(status.as_u16(), body)),
        }
    }

    async fn fetch_unpaid_invoices(
        &self,
        token: &AccessToken,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<RemoteInvoice>, SyncError> {
        let mut paginator = Paginator::new(self.page_size, self.max_pages);
        let mut invoices: Vec<RemoteInvoice> = Vec::new();

        report(progress, "Starting to fetch invoices from Zoho...", 0);

        loop {
            let page = paginator.current_page();
            report(
                progress,
                format!("Fetching page {page}..."),
                ((page - 1) * 10).min(50),
            );

            let body = self.fetch_page(token, page).await?;
            let fetched = body.invoices.len();
            let has_more_page = body.page_context.has_more_page;

            let mut kept = 0_usize;
            for value in body.invoices {
                let raw: RawInvoice = match serde_json::from_value(value) {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!(page, error = %err, "skipping unreadable zoho invoice record");
                        continue;
                    }
                };
                if !raw.is_fully_unpaid() {
                    continue;
                }
                let invoice = raw.normalize();
                if invoice.invoice_id.is_empty() {
                    warn!(page, invoice_number = %invoice.invoice_number, "skipping zoho invoice without id");
                    continue;
                }
                invoices.push(invoice);
                kept += 1;
            }

            report(
                progress,
                format!(
                    "Page {page}: Fetched {fetched} invoices (Total: {})",
                    invoices.len()
                ),
                page.min(50),
            );
            info!(
                page,
                fetched,
                kept,
                has_more_page,
                total = invoices.len(),
                "fetched zoho invoice page"
            );

            match paginator.advance(fetched, has_more_page) {
                PageStep::Fetch(_) => continue,
                PageStep::Stop(reason) => {
                    info!(page, ?reason, "zoho pagination finished");
                    break;
                }
            }
        }

        report(
            progress,
            format!("Completed fetching {} invoices from Zoho", invoices.len()),
            50,
        );
        Ok(invoices)
    }
}

fn endpoint(base: &str, path: &str) -> Result<String, SyncError> {
    let parsed = Url::parse(base)
        .map_err(|err| SyncError::Configuration(format!("invalid Zoho URL {base:?}: {err}")))?;
    Ok(format!("{}/{path}", parsed.as_str().trim_end_matches('/')))
}
