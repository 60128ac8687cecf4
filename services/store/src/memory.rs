//! In-memory store
//!
//! Reference implementation of the repository traits. The match table
//! keeps two unique index sets under the SAME mutex as the rows, so an
//! insert observes and updates "matched" state atomically — this is what
//! makes concurrent matching runs safe without application-level locks.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use types::ids::{CabinetId, ExternalId, MatchId, PayoutRef, SyncOrderId, TransactionId};
use types::matching::MatchRecord;
use types::payout::{Cabinet, ExternalPayoutRecord};
use types::sync::{SyncOrder, SyncStatus};
use types::transaction::{
    InternalWalletTransaction, MatchCandidate, P2POrderTransaction, TransactionKind,
};

use crate::{
    CabinetStore, DateRange, MatchFilter, MatchInsertOutcome, MatchPage, MatchStore, PayoutStore,
    Scope, StoreError, SyncOrderStore, TransactionStore,
};

/// Match rows plus the unique indexes that enforce 1:1 pairing
#[derive(Default)]
struct MatchTable {
    rows: HashMap<MatchId, MatchRecord>,
    payout_index: HashSet<PayoutRef>,
    transaction_index: HashSet<(TransactionKind, TransactionId)>,
}

impl MatchTable {
    fn side_taken(&self, record: &MatchRecord) -> bool {
        self.payout_index.contains(&record.payout)
            || self.transaction_index.contains(&(record.kind, record.transaction_id))
    }

    fn commit(&mut self, record: MatchRecord) {
        self.payout_index.insert(record.payout.clone());
        self.transaction_index.insert((record.kind, record.transaction_id));
        self.rows.insert(record.id, record);
    }
}

/// Shared in-memory storage handle
#[derive(Default)]
pub struct MemoryStore {
    cabinets: Mutex<HashMap<CabinetId, Cabinet>>,
    payouts: Mutex<HashMap<PayoutRef, ExternalPayoutRecord>>,
    wallet_txs: Mutex<HashMap<TransactionId, InternalWalletTransaction>>,
    p2p_txs: Mutex<HashMap<TransactionId, P2POrderTransaction>>,
    sync_orders: Mutex<HashMap<SyncOrderId, SyncOrder>>,
    matches: Mutex<MatchTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lock a table, mapping poisoning to a transient failure
fn lock<'a, T>(mutex: &'a Mutex<T>, table: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Transient(format!("{table} table lock poisoned")))
}

impl CabinetStore for MemoryStore {
    fn insert_cabinet(&self, cabinet: Cabinet) -> Result<CabinetId, StoreError> {
        let mut cabinets = lock(&self.cabinets, "cabinets")?;
        if cabinets.values().any(|c| c.same_credentials(&cabinet)) {
            return Err(StoreError::Conflict(format!(
                "cabinet with the same credentials already exists: {}",
                cabinet.name
            )));
        }
        let id = cabinet.id;
        cabinets.insert(id, cabinet);
        Ok(id)
    }

    fn get_cabinet(&self, id: CabinetId) -> Result<Cabinet, StoreError> {
        lock(&self.cabinets, "cabinets")?
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("cabinet {id}")))
    }

    fn list_cabinets(&self) -> Result<Vec<Cabinet>, StoreError> {
        let mut all: Vec<Cabinet> = lock(&self.cabinets, "cabinets")?.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }
}

impl PayoutStore for MemoryStore {
    fn insert_payouts(&self, records: Vec<ExternalPayoutRecord>) -> Result<usize, StoreError> {
        let mut payouts = lock(&self.payouts, "payouts")?;
        let mut inserted = 0;
        for record in records {
            let key = record.payout_ref();
            // Append-only: an existing row is never overwritten
            if !payouts.contains_key(&key) {
                payouts.insert(key, record);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn known_external_ids(&self, cabinet_id: CabinetId) -> Result<HashSet<ExternalId>, StoreError> {
        Ok(lock(&self.payouts, "payouts")?
            .keys()
            .filter(|key| key.cabinet_id == cabinet_id)
            .map(|key| key.external_id.clone())
            .collect())
    }

    fn payouts_in_range(
        &self,
        range: &DateRange,
        scope: &Scope,
    ) -> Result<Vec<ExternalPayoutRecord>, StoreError> {
        Ok(lock(&self.payouts, "payouts")?
            .values()
            .filter(|r| scope.includes_cabinet(r.cabinet_id))
            .filter(|r| r.approved_at.map(|t| range.contains(t)).unwrap_or(false))
            .cloned()
            .collect())
    }

    fn get_payout(&self, key: &PayoutRef) -> Result<ExternalPayoutRecord, StoreError> {
        lock(&self.payouts, "payouts")?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("payout {key}")))
    }
}

impl TransactionStore for MemoryStore {
    fn insert_wallet_transaction(&self, tx: InternalWalletTransaction) -> Result<(), StoreError> {
        lock(&self.wallet_txs, "wallet_transactions")?.insert(tx.id, tx);
        Ok(())
    }

    fn insert_p2p_transaction(&self, tx: P2POrderTransaction) -> Result<(), StoreError> {
        lock(&self.p2p_txs, "p2p_transactions")?.insert(tx.id, tx);
        Ok(())
    }

    fn candidates_in_range(
        &self,
        kind: TransactionKind,
        range: &DateRange,
        scope: &Scope,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        // Range filtering uses the same normalized settlement time the
        // matcher compares against, so counts can never disagree
        let candidates: Vec<MatchCandidate> = match kind {
            TransactionKind::Wallet => lock(&self.wallet_txs, "wallet_transactions")?
                .values()
                .map(MatchCandidate::from_wallet)
                .collect(),
            TransactionKind::P2pOrder => lock(&self.p2p_txs, "p2p_transactions")?
                .values()
                .map(MatchCandidate::from_p2p)
                .collect(),
        };
        Ok(candidates
            .into_iter()
            .filter(|c| scope.includes_user(c.user_id))
            .filter(|c| range.contains(c.settlement_time))
            .collect())
    }

    fn get_candidate(
        &self,
        kind: TransactionKind,
        id: TransactionId,
    ) -> Result<MatchCandidate, StoreError> {
        let found = match kind {
            TransactionKind::Wallet => lock(&self.wallet_txs, "wallet_transactions")?
                .get(&id)
                .map(MatchCandidate::from_wallet),
            TransactionKind::P2pOrder => lock(&self.p2p_txs, "p2p_transactions")?
                .get(&id)
                .map(MatchCandidate::from_p2p),
        };
        found.ok_or_else(|| StoreError::NotFound(format!("{kind} transaction {id}")))
    }
}

impl SyncOrderStore for MemoryStore {
    fn insert_sync_order(&self, order: SyncOrder) -> Result<SyncOrderId, StoreError> {
        let id = order.id;
        lock(&self.sync_orders, "sync_orders")?.insert(id, order);
        Ok(id)
    }

    fn get_sync_order(&self, id: SyncOrderId) -> Result<SyncOrder, StoreError> {
        lock(&self.sync_orders, "sync_orders")?
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("sync order {id}")))
    }

    fn advance_sync_order(&self, id: SyncOrderId, to: SyncStatus) -> Result<(), StoreError> {
        let mut orders = lock(&self.sync_orders, "sync_orders")?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("sync order {id}")))?;
        order
            .advance(to)
            .map_err(|e| StoreError::Conflict(e.to_string()))
    }
}

impl MatchStore for MemoryStore {
    fn insert_matches(&self, batch: Vec<MatchRecord>) -> Result<MatchInsertOutcome, StoreError> {
        let mut table = lock(&self.matches, "matches")?;
        let mut inserted = Vec::new();
        let mut skipped = 0;
        for record in batch {
            if table.side_taken(&record) {
                // Another run (or an earlier identical run) got here first
                skipped += 1;
                continue;
            }
            inserted.push(record.clone());
            table.commit(record);
        }
        Ok(MatchInsertOutcome {
            inserted,
            skipped_duplicates: skipped,
        })
    }

    fn insert_match_strict(&self, record: MatchRecord) -> Result<MatchId, StoreError> {
        let mut table = lock(&self.matches, "matches")?;
        if table.payout_index.contains(&record.payout) {
            return Err(StoreError::Conflict(format!(
                "payout {} is already matched",
                record.payout
            )));
        }
        if table.transaction_index.contains(&(record.kind, record.transaction_id)) {
            return Err(StoreError::Conflict(format!(
                "{} transaction {} is already matched",
                record.kind, record.transaction_id
            )));
        }
        let id = record.id;
        table.commit(record);
        Ok(id)
    }

    fn delete_match(&self, id: MatchId) -> Result<(), StoreError> {
        let mut table = lock(&self.matches, "matches")?;
        let record = table
            .rows
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))?;
        table.payout_index.remove(&record.payout);
        table.transaction_index.remove(&(record.kind, record.transaction_id));
        Ok(())
    }

    fn get_match(&self, id: MatchId) -> Result<MatchRecord, StoreError> {
        lock(&self.matches, "matches")?
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))
    }

    fn matched_payout_refs(&self) -> Result<HashSet<PayoutRef>, StoreError> {
        Ok(lock(&self.matches, "matches")?.payout_index.clone())
    }

    fn matched_transaction_ids(
        &self,
        kind: TransactionKind,
    ) -> Result<HashSet<TransactionId>, StoreError> {
        Ok(lock(&self.matches, "matches")?
            .transaction_index
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect())
    }

    fn matches_for_payouts(
        &self,
        refs: &HashSet<PayoutRef>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(lock(&self.matches, "matches")?
            .rows
            .values()
            .filter(|m| refs.contains(&m.payout))
            .cloned()
            .collect())
    }

    fn list_matches(
        &self,
        filter: &MatchFilter,
        page: usize,
        per_page: usize,
    ) -> Result<MatchPage, StoreError> {
        let table = lock(&self.matches, "matches")?;
        let mut rows: Vec<MatchRecord> = table
            .rows
            .values()
            .filter(|m| filter.kind.map(|k| m.kind == k).unwrap_or(true))
            .filter(|m| {
                filter
                    .cabinet_ids
                    .as_ref()
                    .map(|s| s.contains(&m.payout.cabinet_id))
                    .unwrap_or(true)
            })
            .filter(|m| filter.manual.map(|f| m.manual == f).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = rows.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(per_page);
        let rows = rows.into_iter().skip(start).take(per_page).collect();
        Ok(MatchPage {
            rows,
            total,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use types::matching::{compute_metrics, MatchRecord};
    use types::money::{ActorRole, CurrencyCode, Money};

    fn payout(cabinet_id: CabinetId, external_id: &str, hour: u32) -> ExternalPayoutRecord {
        let mut money = Money::new();
        money.insert(CurrencyCode::settlement(), ActorRole::Trader, Decimal::from(500));
        ExternalPayoutRecord {
            external_id: ExternalId::new(external_id),
            cabinet_id,
            wallet: "w".to_string(),
            payment_method_id: None,
            amount: money.clone(),
            total: money,
            status: 5,
            approved_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()),
            expired_at: None,
            source_created_at: None,
            source_updated_at: None,
            extra: serde_json::Value::Null,
        }
    }

    fn match_record(payout: PayoutRef, tx: TransactionId) -> MatchRecord {
        let metrics = compute_metrics(TransactionKind::Wallet, Decimal::from(500), Decimal::from(500));
        MatchRecord::new(payout, tx, TransactionKind::Wallet, 60, metrics, false)
    }

    #[test]
    fn test_payout_dedup_on_composite_key() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        let first = store
            .insert_payouts(vec![payout(cabinet, "1", 10), payout(cabinet, "2", 11)])
            .unwrap();
        assert_eq!(first, 2);

        // Re-ingesting the same page adds zero rows
        let second = store
            .insert_payouts(vec![payout(cabinet, "1", 10), payout(cabinet, "2", 11)])
            .unwrap();
        assert_eq!(second, 0);

        // Same external id under a different cabinet is a new row
        let third = store.insert_payouts(vec![payout(CabinetId::new(), "1", 10)]).unwrap();
        assert_eq!(third, 1);
    }

    #[test]
    fn test_batch_insert_skips_taken_sides() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        let p1 = PayoutRef::new(ExternalId::new("1"), cabinet);
        let p2 = PayoutRef::new(ExternalId::new("2"), cabinet);
        let tx1 = TransactionId::new();
        let tx2 = TransactionId::new();

        let outcome = store
            .insert_matches(vec![match_record(p1.clone(), tx1)])
            .unwrap();
        assert_eq!(outcome.inserted.len(), 1);

        // Same payout with a fresh transaction: skipped. Fresh payout with
        // the taken transaction: skipped. Fresh pair: committed.
        let outcome = store
            .insert_matches(vec![
                match_record(p1.clone(), tx2),
                match_record(p2.clone(), tx1),
                match_record(p2.clone(), tx2),
            ])
            .unwrap();
        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.skipped_duplicates, 2);

        assert_eq!(store.matched_payout_refs().unwrap().len(), 2);
        assert_eq!(
            store.matched_transaction_ids(TransactionKind::Wallet).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_strict_insert_conflicts() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        let p1 = PayoutRef::new(ExternalId::new("1"), cabinet);
        let tx1 = TransactionId::new();

        store.insert_match_strict(match_record(p1.clone(), tx1)).unwrap();

        let err = store
            .insert_match_strict(match_record(p1.clone(), TransactionId::new()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .insert_match_strict(match_record(
                PayoutRef::new(ExternalId::new("2"), cabinet),
                tx1,
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_delete_match_frees_both_sides() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        let p1 = PayoutRef::new(ExternalId::new("1"), cabinet);
        let tx1 = TransactionId::new();

        let id = store.insert_match_strict(match_record(p1.clone(), tx1)).unwrap();
        store.delete_match(id).unwrap();

        assert!(store.matched_payout_refs().unwrap().is_empty());
        // Both sides are insertable again
        store.insert_match_strict(match_record(p1, tx1)).unwrap();

        assert!(matches!(store.delete_match(MatchId::new()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_cabinet_credentials_conflict() {
        let store = MemoryStore::new();
        store.insert_cabinet(Cabinet::new("a", "key", "secret")).unwrap();
        let err = store.insert_cabinet(Cabinet::new("b", "key", "secret")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_payouts_in_range_requires_approval_time() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        let mut unapproved = payout(cabinet, "1", 10);
        unapproved.approved_at = None;
        store
            .insert_payouts(vec![unapproved, payout(cabinet, "2", 10), payout(cabinet, "3", 23)])
            .unwrap();

        let range = DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
        .unwrap();
        let rows = store.payouts_in_range(&range, &Scope::unrestricted()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].external_id, ExternalId::new("2"));
    }

    #[test]
    fn test_list_matches_pagination() {
        let store = MemoryStore::new();
        let cabinet = CabinetId::new();
        for i in 0..5 {
            store
                .insert_match_strict(match_record(
                    PayoutRef::new(ExternalId::new(i.to_string()), cabinet),
                    TransactionId::new(),
                ))
                .unwrap();
        }

        let page = store.list_matches(&MatchFilter::default(), 1, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.rows.len(), 2);

        let last = store.list_matches(&MatchFilter::default(), 3, 2).unwrap();
        assert_eq!(last.rows.len(), 1);
    }

    #[test]
    fn test_list_matches_cabinet_filter() {
        let store = MemoryStore::new();
        let ours = CabinetId::new();
        let theirs = CabinetId::new();
        for (cabinet, external_id) in [(ours, "1"), (ours, "2"), (theirs, "3")] {
            store
                .insert_match_strict(match_record(
                    PayoutRef::new(ExternalId::new(external_id), cabinet),
                    TransactionId::new(),
                ))
                .unwrap();
        }

        let filter = MatchFilter {
            cabinet_ids: Some([ours].into_iter().collect()),
            ..MatchFilter::default()
        };
        let page = store.list_matches(&filter, 1, 10).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.rows.iter().all(|m| m.payout.cabinet_id == ours));
    }
}
