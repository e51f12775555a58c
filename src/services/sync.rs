use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use tracing::{error, info};

use crate::{
    domain::models::{InvoiceStatus, NewInvoice, SyncStats, INTERNAL_DUE_DAYS},
    infrastructure::{state::AppState, store::InvoiceStore, zoho::InvoiceProvider},
};

use super::{
    errors::SyncError,
    progress::{report, ProgressSink},
};

/// Reconciles the local unpaid mirror with Zoho's unpaid set.
///
/// Upserts every remote invoice, hard-deletes local unpaid rows whose id no
/// longer appears remotely, then recounts. Writes are not wrapped in a
/// transaction; rerunning the sync converges on the remote state.
pub struct SyncService {
    provider: Arc<dyn InvoiceProvider>,
    store: Arc<dyn InvoiceStore>,
    due_in_days: i64,
}

impl SyncService {
    pub fn new(provider: Arc<dyn InvoiceProvider>, store: Arc<dyn InvoiceStore>) -> Self {
        Self {
            provider,
            store,
            due_in_days: INTERNAL_DUE_DAYS,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(Arc::clone(&state.provider), Arc::clone(&state.store))
            .with_due_in_days(state.config.sync.due_in_days)
    }

    pub fn with_due_in_days(mut self, days: i64) -> Self {
        self.due_in_days = days;
        self
    }

    pub async fn run(&self, progress: &dyn ProgressSink) -> Result<SyncStats, SyncError> {
        report(progress, "Getting Zoho access token...", 5);
        let token = self.provider.access_token().await?;
        report(progress, "Access token obtained", 10);

        let remote = self.provider.fetch_unpaid_invoices(&token, progress).await?;
        info!(fetched = remote.len(), "fetched unpaid invoices from zoho");

        report(progress, "Fetching existing invoices from database...", 55);
        let existing = self
            .store
            .external_ids_with_status(InvoiceStatus::Unpaid)
            .await
            .map_err(|err| {
                SyncError::Persistence(format!("Failed to fetch existing invoices: {err}"))
            })?;
        report(
            progress,
            format!("Found {} existing invoices in database", existing.len()),
            60,
        );

        let current: HashSet<&str> = remote.iter().map(|inv| inv.invoice_id.as_str()).collect();

        let total = remote.len();
        report(progress, format!("Processing {total} invoices..."), 65);
        let synced_at = Utc::now();
        let mut added_count = 0_u64;
        let mut skipped = 0_usize;

        for (index, invoice) in remote.iter().enumerate() {
            if index % 50 == 0 || index + 1 == total {
                let pct = 65 + (index * 25 / total) as u32;
                report(
                    progress,
                    format!("Processing invoice {} of {total}...", index + 1),
                    pct,
                );
            }

            let record = match NewInvoice::from_remote(invoice, self.due_in_days, synced_at) {
                Ok(record) => record,
                Err(err) => {
                    error!(invoice_id = %invoice.invoice_id, error = %err, "skipping invoice");
                    skipped += 1;
                    continue;
                }
            };

            if let Err(err) = self.store.upsert(&record).await {
                error!(invoice_id = %invoice.invoice_id, error = %err, "failed to upsert invoice");
                skipped += 1;
                continue;
            }

            if !existing.contains(&invoice.invoice_id) {
                added_count += 1;
            }
        }

        report(progress, "Checking for invoices to remove...", 90);
        let mut to_remove: Vec<String> = existing
            .iter()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        to_remove.sort();

        let removed_count = to_remove.len() as u64;
        if !to_remove.is_empty() {
            report(
                progress,
                format!("Removing {} paid invoices...", to_remove.len()),
                92,
            );
            self.store
                .delete_by_external_ids(&to_remove)
                .await
                .map_err(|err| {
                    SyncError::Persistence(format!("Failed to remove paid invoices: {err}"))
                })?;
        }

        report(progress, "Finalizing sync...", 95);
        let total_unpaid = self
            .store
            .count_with_status(InvoiceStatus::Unpaid)
            .await
            .map_err(SyncError::persistence)?;

        report(progress, "Sync completed successfully!", 100);
        info!(
            added_count,
            removed_count,
            total_unpaid,
            skipped,
            "zoho invoice sync completed"
        );

        Ok(SyncStats {
            added_count,
            removed_count,
            total_unpaid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::models::RemoteInvoice,
        infrastructure::{store::MemoryInvoiceStore, zoho::AccessToken},
        services::progress::{NoopProgress, ProgressEvent},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        token_error: Option<u16>,
        fetch_error: Option<u16>,
        invoices: Vec<RemoteInvoice>,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn returning(ids: &[&str]) -> Self {
            Self {
                token_error: None,
                fetch_error: None,
                invoices: ids.iter().map(|id| remote(id, "2024-01-01")).collect(),
                fetch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InvoiceProvider for ScriptedProvider {
        async fn access_token(&self) -> Result<AccessToken, SyncError> {
            match self.token_error {
                Some(status) => Err(SyncError::credential_status(status, "invalid_client")),
                None => Ok(AccessToken::new("token")),
            }
        }

        async fn fetch_unpaid_invoices(
            &self,
            _token: &AccessToken,
            _progress: &dyn ProgressSink,
        ) -> Result<Vec<RemoteInvoice>, SyncError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            match self.fetch_error {
                Some(status) => Err(SyncError::remote_status(status, "page 2 failed")),
                None => Ok(self.invoices.clone()),
            }
        }
    }

    /// Delegates to an in-memory store but fails upserts for one id.
    struct FlakyStore {
        inner: MemoryInvoiceStore,
        reject: String,
        fail_delete: bool,
    }

    #[async_trait]
    impl InvoiceStore for FlakyStore {
        async fn external_ids_with_status(
            &self,
            status: InvoiceStatus,
        ) -> anyhow::Result<HashSet<String>> {
            self.inner.external_ids_with_status(status).await
        }

        async fn upsert(&self, invoice: &NewInvoice) -> anyhow::Result<()> {
            if invoice.zoho_invoice_id == self.reject {
                anyhow::bail!("value too long for column");
            }
            self.inner.upsert(invoice).await
        }

        async fn delete_by_external_ids(&self, ids: &[String]) -> anyhow::Result<u64> {
            if self.fail_delete {
                anyhow::bail!("connection reset");
            }
            self.inner.delete_by_external_ids(ids).await
        }

        async fn count_with_status(&self, status: InvoiceStatus) -> anyhow::Result<u64> {
            self.inner.count_with_status(status).await
        }

        async fn list_with_status(
            &self,
            status: InvoiceStatus,
        ) -> anyhow::Result<Vec<crate::domain::models::Invoice>> {
            self.inner.list_with_status(status).await
        }

        async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
            self.inner.last_synced_at().await
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingProgress {
        fn notify(&self, event: ProgressEvent) {
            self.events.lock().push(event);
        }
    }

    fn remote(id: &str, date: &str) -> RemoteInvoice {
        RemoteInvoice {
            invoice_id: id.to_string(),
            customer_name: format!("Customer {id}"),
            customer_email: None,
            customer_phone: None,
            salesperson_name: None,
            status: "Overdue".to_string(),
            invoice_number: format!("INV-{id}"),
            invoice_date: date.to_string(),
            total: 250.0,
            balance: 250.0,
        }
    }

    async fn seeded_store(ids: &[&str]) -> Arc<MemoryInvoiceStore> {
        let store = MemoryInvoiceStore::default();
        for id in ids {
            let record = NewInvoice::from_remote(&remote(id, "2023-12-01"), 30, Utc::now())
                .expect("valid seed");
            store.upsert(&record).await.unwrap();
        }
        Arc::new(store)
    }

    fn ids(store: &MemoryInvoiceStore) -> Vec<String> {
        let mut ids: Vec<String> = store
            .snapshot()
            .into_iter()
            .map(|invoice| invoice.zoho_invoice_id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn reconciles_added_and_removed_invoices() {
        let store = seeded_store(&["A", "B", "D"]).await;
        let provider = Arc::new(ScriptedProvider::returning(&["A", "B", "C"]));
        let service = SyncService::new(provider, store.clone());

        let stats = service.run(&NoopProgress).await.expect("sync succeeds");

        assert_eq!(
            stats,
            SyncStats {
                added_count: 1,
                removed_count: 1,
                total_unpaid: 3,
            }
        );
        assert_eq!(ids(&store), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_rows_and_due_dates() {
        let store = seeded_store(&["A"]).await;
        let provider = Arc::new(ScriptedProvider::returning(&["A"]));
        let service = SyncService::new(provider, store.clone());

        service.run(&NoopProgress).await.unwrap();

        let row = store.snapshot().remove(0);
        assert_eq!(row.invoice_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(row.internal_due_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(row.zoho_status.as_deref(), Some("Overdue"));
    }

    #[tokio::test]
    async fn empty_remote_set_clears_the_mirror() {
        let store = seeded_store(&["A", "B"]).await;
        let provider = Arc::new(ScriptedProvider::returning(&[]));
        let service = SyncService::new(provider, store.clone());

        let stats = service.run(&NoopProgress).await.unwrap();

        assert_eq!(stats.added_count, 0);
        assert_eq!(stats.removed_count, 2);
        assert_eq!(stats.total_unpaid, 0);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn token_failure_leaves_store_untouched() {
        let store = seeded_store(&["A", "D"]).await;
        let provider = Arc::new(ScriptedProvider {
            token_error: Some(401),
            ..ScriptedProvider::returning(&["A", "B", "C"])
        });
        let service = SyncService::new(provider.clone(), store.clone());

        let err = service.run(&NoopProgress).await.expect_err("sync fails");

        assert!(matches!(err, SyncError::CredentialExchange { status: Some(401), .. }));
        assert!(err.to_string().contains("authentication"));
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ids(&store), vec!["A", "D"]);
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let store = seeded_store(&["A", "D"]).await;
        let before = store.snapshot();
        let provider = Arc::new(ScriptedProvider {
            fetch_error: Some(500),
            ..ScriptedProvider::returning(&["A", "B", "C"])
        });
        let service = SyncService::new(provider.clone(), store.clone());

        let err = service.run(&NoopProgress).await.expect_err("sync fails");

        assert!(matches!(err, SyncError::RemoteFetch { status: Some(500), .. }));
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_upsert_is_skipped_without_aborting() {
        let inner = MemoryInvoiceStore::default();
        let store = Arc::new(FlakyStore {
            inner,
            reject: "B".to_string(),
            fail_delete: false,
        });
        let provider = Arc::new(ScriptedProvider::returning(&["A", "B", "C"]));
        let service = SyncService::new(provider, store.clone());

        let stats = service.run(&NoopProgress).await.expect("sync succeeds");

        assert_eq!(stats.added_count, 2);
        assert_eq!(stats.total_unpaid, 2);
    }

    #[tokio::test]
    async fn unparseable_invoice_date_is_skipped_but_not_deleted() {
        let store = seeded_store(&["A", "B"]).await;
        let provider = Arc::new(ScriptedProvider {
            invoices: vec![remote("A", "2024-01-01"), remote("B", "")],
            ..ScriptedProvider::returning(&[])
        });
        let service = SyncService::new(provider, store.clone());

        let stats = service.run(&NoopProgress).await.unwrap();

        assert_eq!(stats.removed_count, 0);
        assert_eq!(ids(&store), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn delete_failure_aborts_sync() {
        let inner = MemoryInvoiceStore::default();
        inner
            .upsert(&NewInvoice::from_remote(&remote("D", "2024-01-01"), 30, Utc::now()).unwrap())
            .await
            .unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            reject: String::new(),
            fail_delete: true,
        });
        let provider = Arc::new(ScriptedProvider::returning(&["A"]));
        let service = SyncService::new(provider, store);

        let err = service.run(&NoopProgress).await.expect_err("sync fails");

        match err {
            SyncError::Persistence(message) => {
                assert!(message.contains("Failed to remove paid invoices"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn configured_due_offset_is_applied() {
        let store = Arc::new(MemoryInvoiceStore::default());
        let provider = Arc::new(ScriptedProvider::returning(&["A"]));
        let service = SyncService::new(provider, store.clone()).with_due_in_days(45);

        service.run(&NoopProgress).await.unwrap();

        assert_eq!(
            store.snapshot()[0].internal_due_date,
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );
    }

    #[tokio::test]
    async fn progress_reaches_one_hundred_in_order() {
        let store = Arc::new(MemoryInvoiceStore::default());
        let provider = Arc::new(ScriptedProvider::returning(&["A", "B"]));
        let service = SyncService::new(provider, store);
        let progress = RecordingProgress::default();

        service.run(&progress).await.unwrap();

        let events = progress.events.lock();
        let percents: Vec<u8> = events.iter().filter_map(|event| event.progress).collect();
        assert_eq!(percents.first(), Some(&5));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(
            events.last().map(|event| event.message.as_str()),
            Some("Sync completed successfully!")
        );
    }
}
