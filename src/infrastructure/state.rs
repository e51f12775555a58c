use std::sync::Arc;

use crate::infrastructure::{config::Config, store::InvoiceStore, zoho::InvoiceProvider};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn InvoiceStore>,
    pub provider: Arc<dyn InvoiceProvider>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn InvoiceStore>,
        provider: Arc<dyn InvoiceProvider>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
        }
    }
}
