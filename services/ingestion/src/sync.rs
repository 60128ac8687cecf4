//! Sync orders and the page-by-page ingestion loop
//!
//! A request creates a `Pending` sync order and immediately gets the
//! order id back; `run_order` is the worker-side execution of that
//! contract. The loop is sequential by design: one page at a time, a
//! fixed delay between pages, and an early stop as soon as a full page
//! contains nothing new.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use store::{with_retry, PayoutStore, Store};
use types::errors::ReconError;
use types::ids::{CabinetId, SyncOrderId};
use types::payout::{Cabinet, ExternalPayoutRecord};
use types::sync::{SyncOrder, SyncStatus, SyncTarget};

use crate::client::{PayoutPage, PayoutSource};
use crate::config::IngestionConfig;

/// Per-cabinet ingestion counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabinetIngest {
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub records_ingested: usize,
    pub records_skipped: usize,
}

/// Whole-order ingestion counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub cabinets_processed: usize,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub records_ingested: usize,
    pub records_skipped: usize,
}

impl IngestReport {
    fn absorb(&mut self, cabinet: CabinetIngest) {
        self.cabinets_processed += 1;
        self.pages_fetched += cabinet.pages_fetched;
        self.pages_failed += cabinet.pages_failed;
        self.records_ingested += cabinet.records_ingested;
        self.records_skipped += cabinet.records_skipped;
    }
}

/// Ingestion front door: accepts sync requests, runs orders
pub struct IngestionService<S, C> {
    store: Arc<S>,
    source: C,
    config: IngestionConfig,
}

impl<S, C> IngestionService<S, C>
where
    S: Store,
    C: PayoutSource,
{
    pub fn new(store: Arc<S>, source: C, config: IngestionConfig) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Accept a sync request: validate the target, create a `Pending`
    /// order, hand back its id. Execution is the worker's business.
    pub async fn request_sync(
        &self,
        target: SyncTarget,
        page_budget: u32,
    ) -> Result<SyncOrderId, ReconError> {
        if page_budget == 0 {
            return Err(ReconError::Validation("page budget must be positive".to_string()));
        }
        if let SyncTarget::OneCabinet { cabinet_id } = target {
            // Fails with NotFound before an order is created
            with_retry(&self.config.storage_retry, "cabinets", || {
                self.store.get_cabinet(cabinet_id)
            })
            .await?;
        }

        let order = SyncOrder::new(target, page_budget);
        let id = with_retry(&self.config.storage_retry, "sync_orders", || {
            self.store.insert_sync_order(order.clone())
        })
        .await?;
        info!(order_id = %id, ?target, page_budget, "sync order accepted");
        Ok(id)
    }

    /// Execute one order through its lifecycle:
    /// Pending → InProgress → {Completed, Failed}.
    pub async fn run_order(&self, id: SyncOrderId) -> Result<IngestReport, ReconError> {
        let order = with_retry(&self.config.storage_retry, "sync_orders", || {
            self.store.get_sync_order(id)
        })
        .await?;

        with_retry(&self.config.storage_retry, "sync_orders", || {
            self.store.advance_sync_order(id, SyncStatus::InProgress)
        })
        .await?;

        match self.run_target(order.target, order.page_budget).await {
            Ok(report) => {
                with_retry(&self.config.storage_retry, "sync_orders", || {
                    self.store.advance_sync_order(id, SyncStatus::Completed)
                })
                .await?;
                info!(order_id = %id, records = report.records_ingested, "sync order completed");
                Ok(report)
            }
            Err(err) => {
                warn!(order_id = %id, %err, "sync order failed");
                with_retry(&self.config.storage_retry, "sync_orders", || {
                    self.store.advance_sync_order(id, SyncStatus::Failed)
                })
                .await?;
                Err(err)
            }
        }
    }

    async fn run_target(
        &self,
        target: SyncTarget,
        page_budget: u32,
    ) -> Result<IngestReport, ReconError> {
        let cabinets = match target {
            SyncTarget::OneCabinet { cabinet_id } => {
                vec![
                    with_retry(&self.config.storage_retry, "cabinets", || {
                        self.store.get_cabinet(cabinet_id)
                    })
                    .await?,
                ]
            }
            SyncTarget::AllCabinets => {
                with_retry(&self.config.storage_retry, "cabinets", || {
                    self.store.list_cabinets()
                })
                .await?
            }
        };

        let mut report = IngestReport::default();
        for cabinet in &cabinets {
            report.absorb(self.ingest_cabinet(cabinet, page_budget).await?);
        }
        Ok(report)
    }

    /// Page through one cabinet's payout history until the budget runs
    /// out or persisted history is reached.
    pub async fn ingest_cabinet(
        &self,
        cabinet: &Cabinet,
        max_pages: u32,
    ) -> Result<CabinetIngest, ReconError> {
        let session = self.source.authenticate(cabinet).await?;
        let mut ingest = CabinetIngest::default();

        for page in 1..=max_pages {
            if page > 1 {
                // Fixed spacing so we do not trip the upstream limiter
                tokio::time::sleep(self.config.inter_page_delay).await;
            }

            let fetched = match self.source.fetch_page(&session, page).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    // One bad page is not fatal to the run
                    warn!(cabinet = %cabinet.id, page, %err, "page fetch failed, skipping");
                    ingest.pages_failed += 1;
                    continue;
                }
            };
            ingest.pages_fetched += 1;
            ingest.records_skipped += fetched.undecodable;

            // Termination looks at the page length as the panel served
            // it, undecodable rows included
            let page_len = fetched.source_len();
            if page_len == 0 {
                break;
            }

            let mut records = Vec::with_capacity(fetched.rows.len());
            for row in fetched.rows {
                match row.normalize(cabinet.id) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        warn!(cabinet = %cabinet.id, page, %err, "skipping malformed record");
                        ingest.records_skipped += 1;
                    }
                }
            }

            let fresh = self.filter_new(cabinet.id, records).await?;
            let caught_up = fresh.is_empty() && page_len == self.config.page_size as usize;

            if !fresh.is_empty() {
                ingest.records_ingested += self.persist(fresh).await?;
            }

            if caught_up {
                // A full page with nothing new: history is in sync
                info!(cabinet = %cabinet.id, page, "reached already-persisted history");
                break;
            }
            if page_len < self.config.page_size as usize {
                // Short page: upstream has no more
                break;
            }
        }

        info!(
            cabinet = %cabinet.id,
            pages = ingest.pages_fetched,
            new_records = ingest.records_ingested,
            "cabinet ingestion finished"
        );
        Ok(ingest)
    }

    /// Drop records whose (external_id, cabinet_id) is already persisted
    async fn filter_new(
        &self,
        cabinet_id: CabinetId,
        records: Vec<ExternalPayoutRecord>,
    ) -> Result<Vec<ExternalPayoutRecord>, ReconError> {
        let known: HashSet<_> = with_retry(&self.config.storage_retry, "payouts", || {
            self.store.known_external_ids(cabinet_id)
        })
        .await?;
        Ok(records
            .into_iter()
            .filter(|r| !known.contains(&r.external_id))
            .collect())
    }

    /// Append-only insert through the transient-storage retry helper
    async fn persist(&self, records: Vec<ExternalPayoutRecord>) -> Result<usize, ReconError> {
        let inserted = with_retry(&self.config.storage_retry, "payouts", || {
            self.store.insert_payouts(records.clone())
        })
        .await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    use store::{CabinetStore, MemoryStore, RetryPolicy, SyncOrderStore};
    use types::errors::UpstreamError;

    use crate::backoff::BackoffPolicy;
    use crate::client::Session;
    use crate::records::RawPayoutRecord;

    /// Scripted page source: pages[i] is served for page i+1; a `None`
    /// page simulates a terminal fetch failure.
    struct ScriptedSource {
        pages: Vec<Option<PayoutPage>>,
        fetches: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Option<PayoutPage>>) -> Self {
            Self {
                pages,
                fetches: Mutex::new(Vec::new()),
            }
        }

        fn fetched_pages(&self) -> Vec<u32> {
            self.fetches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PayoutSource for ScriptedSource {
        async fn authenticate(&self, _cabinet: &Cabinet) -> Result<Session, ReconError> {
            Ok(Session {
                cookie: "abc".to_string(),
                token: "tok".to_string(),
            })
        }

        async fn fetch_page(&self, _session: &Session, page: u32) -> Result<PayoutPage, ReconError> {
            self.fetches.lock().unwrap().push(page);
            match self.pages.get((page - 1) as usize) {
                Some(Some(served)) => Ok(served.clone()),
                Some(None) => Err(UpstreamError::BadStatus { status: 500, page }.into()),
                None => Ok(PayoutPage::default()),
            }
        }
    }

    fn raw_record(id: u64) -> RawPayoutRecord {
        serde_json::from_value(json!({
            "id": id,
            "wallet": "w",
            "amount": { "643": { "trader": "500.00" } },
            "total": { "643": { "trader": "504.5" } },
            "status": 5,
            "approved_at": "2024-01-01T10:00:00Z"
        }))
        .unwrap()
    }

    fn page(rows: Vec<RawPayoutRecord>) -> PayoutPage {
        PayoutPage {
            rows,
            undecodable: 0,
        }
    }

    fn page_of(ids: std::ops::Range<u64>) -> PayoutPage {
        page(ids.map(raw_record).collect())
    }

    fn config(page_size: u32) -> IngestionConfig {
        IngestionConfig {
            page_size,
            inter_page_delay: Duration::from_millis(1),
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(1),
                max_attempts: 2,
            },
            storage_retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            ..IngestionConfig::default()
        }
    }

    fn service(
        store: Arc<MemoryStore>,
        source: ScriptedSource,
        page_size: u32,
    ) -> IngestionService<MemoryStore, ScriptedSource> {
        IngestionService::new(store, source, config(page_size))
    }

    fn cabinet(store: &MemoryStore) -> Cabinet {
        let cabinet = Cabinet::new("main", "key", "secret");
        store.insert_cabinet(cabinet.clone()).unwrap();
        cabinet
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_until_short_page() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);
        // Two full pages of 2, then a short page of 1
        let source = ScriptedSource::new(vec![
            Some(page_of(1..3)),
            Some(page_of(3..5)),
            Some(page_of(5..6)),
        ]);
        let svc = service(store.clone(), source, 2);

        let ingest = svc.ingest_cabinet(&cab, 10).await.unwrap();
        assert_eq!(ingest.records_ingested, 5);
        assert_eq!(ingest.pages_fetched, 3);
        assert_eq!(svc.source.fetched_pages(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_stops_pagination() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);

        // First run persists pages 1..2
        let source = ScriptedSource::new(vec![Some(page_of(1..3)), Some(page_of(3..5))]);
        let svc = service(store.clone(), source, 2);
        let first = svc.ingest_cabinet(&cab, 10).await.unwrap();
        assert_eq!(first.records_ingested, 4);

        // Second run: page 1 is full and entirely known → stop right there
        let source = ScriptedSource::new(vec![Some(page_of(1..3)), Some(page_of(3..5))]);
        let svc = service(store.clone(), source, 2);
        let second = svc.ingest_cabinet(&cab, 10).await.unwrap();
        assert_eq!(second.records_ingested, 0);
        assert_eq!(svc.source.fetched_pages(), vec![1], "must not request further pages");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_page_skipped_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);
        let source = ScriptedSource::new(vec![
            Some(page_of(1..3)),
            None, // page 2 blows up
            Some(page_of(3..4)),
        ]);
        let svc = service(store.clone(), source, 2);

        let ingest = svc.ingest_cabinet(&cab, 3).await.unwrap();
        assert_eq!(ingest.pages_failed, 1);
        assert_eq!(ingest.records_ingested, 3);
        assert_eq!(svc.source.fetched_pages(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_rows_counted_and_fill_the_page() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);
        // Page 1 was full upstream even though only one row decoded, so
        // pagination must carry on to page 2
        let source = ScriptedSource::new(vec![Some(PayoutPage {
            rows: vec![raw_record(1)],
            undecodable: 1,
        })]);
        let svc = service(store.clone(), source, 2);

        let ingest = svc.ingest_cabinet(&cab, 10).await.unwrap();
        assert_eq!(ingest.records_ingested, 1);
        assert_eq!(ingest.records_skipped, 1);
        assert_eq!(svc.source.fetched_pages(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_overlap_keeps_only_new() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);

        let source = ScriptedSource::new(vec![Some(page_of(1..3))]);
        let svc = service(store.clone(), source, 2);
        svc.ingest_cabinet(&cab, 10).await.unwrap();

        // Next run: page 1 has one known and one new record
        let source = ScriptedSource::new(vec![Some(page(vec![raw_record(2), raw_record(3)]))]);
        let svc = service(store.clone(), source, 10);
        let ingest = svc.ingest_cabinet(&cab, 10).await.unwrap();
        assert_eq!(ingest.records_ingested, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let cab = cabinet(&store);
        let source = ScriptedSource::new(vec![Some(page_of(1..3))]);
        let svc = service(store.clone(), source, 10);

        let id = svc
            .request_sync(SyncTarget::OneCabinet { cabinet_id: cab.id }, 5)
            .await
            .unwrap();
        assert_eq!(store.get_sync_order(id).unwrap().status, SyncStatus::Pending);

        let report = svc.run_order(id).await.unwrap();
        assert_eq!(report.records_ingested, 2);
        assert_eq!(report.cabinets_processed, 1);
        assert_eq!(store.get_sync_order(id).unwrap().status, SyncStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_sync_validation() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new(vec![]);
        let svc = service(store.clone(), source, 10);

        let err = svc.request_sync(SyncTarget::AllCabinets, 0).await.unwrap_err();
        assert!(matches!(err, ReconError::Validation(_)));

        let err = svc
            .request_sync(
                SyncTarget::OneCabinet {
                    cabinet_id: CabinetId::new(),
                },
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::NotFound(_)));
    }
}
