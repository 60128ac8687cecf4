//! Storage layer for the reconciliation engine
//!
//! Defines the repository traits the services program against, the query
//! predicate types (date range, scope, filters), and the in-memory
//! implementation used by the engine. The one-to-one pairing invariant is
//! enforced HERE, with unique indexes inside the match table, so that two
//! concurrent matching runs cannot both commit a pair for the same record
//! even when each computed "unmatched" from a stale snapshot.

mod memory;
mod retry;

pub use memory::MemoryStore;
pub use retry::{with_retry, RetryPolicy};

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use types::ids::{CabinetId, ExternalId, MatchId, PayoutRef, SyncOrderId, TransactionId};
use types::matching::MatchRecord;
use types::payout::{Cabinet, ExternalPayoutRecord};
use types::sync::{SyncOrder, SyncStatus};
use types::transaction::{
    InternalWalletTransaction, MatchCandidate, P2POrderTransaction, TransactionKind,
};

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Connection-loss class failure; callers retry via [`with_retry`]
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for types::errors::ReconError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(detail) => types::errors::ReconError::TransientStorage(detail),
            StoreError::Conflict(detail) => types::errors::ReconError::Conflict(detail),
            StoreError::NotFound(detail) => types::errors::ReconError::NotFound(detail),
        }
    }
}

/// Inclusive date range predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Optional scope narrowing: cabinet set on the payout side, user set on
/// the internal-transaction side. `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub cabinet_ids: Option<HashSet<CabinetId>>,
    pub user_ids: Option<HashSet<u64>>,
}

impl Scope {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn includes_cabinet(&self, id: CabinetId) -> bool {
        self.cabinet_ids.as_ref().map(|s| s.contains(&id)).unwrap_or(true)
    }

    pub fn includes_user(&self, id: u64) -> bool {
        self.user_ids.as_ref().map(|s| s.contains(&id)).unwrap_or(true)
    }
}

/// Filter for listing persisted matches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilter {
    pub kind: Option<TransactionKind>,
    pub cabinet_ids: Option<HashSet<CabinetId>>,
    pub manual: Option<bool>,
}

/// One page of match rows, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPage {
    pub rows: Vec<MatchRecord>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Outcome of a batch match insert
#[derive(Debug, Clone, PartialEq)]
pub struct MatchInsertOutcome {
    /// Records actually committed this call
    pub inserted: Vec<MatchRecord>,
    /// Records silently skipped because a side was already matched
    pub skipped_duplicates: usize,
}

pub trait CabinetStore: Send + Sync {
    /// Insert a cabinet; duplicate credential pairs are a conflict
    fn insert_cabinet(&self, cabinet: Cabinet) -> Result<CabinetId, StoreError>;
    fn get_cabinet(&self, id: CabinetId) -> Result<Cabinet, StoreError>;
    fn list_cabinets(&self) -> Result<Vec<Cabinet>, StoreError>;
}

pub trait PayoutStore: Send + Sync {
    /// Append-only insert, deduplicating on `(external_id, cabinet_id)`.
    /// Returns how many rows were actually new.
    fn insert_payouts(&self, records: Vec<ExternalPayoutRecord>) -> Result<usize, StoreError>;

    /// External ids already persisted for a cabinet
    fn known_external_ids(&self, cabinet_id: CabinetId) -> Result<HashSet<ExternalId>, StoreError>;

    /// Payouts whose `approved_at` falls in range, narrowed by scope
    fn payouts_in_range(&self, range: &DateRange, scope: &Scope)
        -> Result<Vec<ExternalPayoutRecord>, StoreError>;

    fn get_payout(&self, key: &PayoutRef) -> Result<ExternalPayoutRecord, StoreError>;
}

pub trait TransactionStore: Send + Sync {
    fn insert_wallet_transaction(&self, tx: InternalWalletTransaction) -> Result<(), StoreError>;
    fn insert_p2p_transaction(&self, tx: P2POrderTransaction) -> Result<(), StoreError>;

    /// Candidates of one kind whose NORMALIZED settlement time falls in
    /// range, narrowed by user scope
    fn candidates_in_range(
        &self,
        kind: TransactionKind,
        range: &DateRange,
        scope: &Scope,
    ) -> Result<Vec<MatchCandidate>, StoreError>;

    fn get_candidate(&self, kind: TransactionKind, id: TransactionId)
        -> Result<MatchCandidate, StoreError>;
}

pub trait SyncOrderStore: Send + Sync {
    fn insert_sync_order(&self, order: SyncOrder) -> Result<SyncOrderId, StoreError>;
    fn get_sync_order(&self, id: SyncOrderId) -> Result<SyncOrder, StoreError>;

    /// Advance the lifecycle; illegal transitions are a conflict
    fn advance_sync_order(&self, id: SyncOrderId, to: SyncStatus) -> Result<(), StoreError>;
}

pub trait MatchStore: Send + Sync {
    /// Batch insert; any record whose payout or transaction side is
    /// already matched is skipped silently (idempotent re-runs)
    fn insert_matches(&self, batch: Vec<MatchRecord>) -> Result<MatchInsertOutcome, StoreError>;

    /// Single insert that REJECTS with a conflict when a side is already
    /// matched — the manual-match path
    fn insert_match_strict(&self, record: MatchRecord) -> Result<MatchId, StoreError>;

    /// Hard delete; frees both sides for re-matching, no other effects
    fn delete_match(&self, id: MatchId) -> Result<(), StoreError>;

    fn get_match(&self, id: MatchId) -> Result<MatchRecord, StoreError>;

    /// Relation-existence predicates. "Matched" is always computed from
    /// these, never cached as a flag on the source rows.
    fn matched_payout_refs(&self) -> Result<HashSet<PayoutRef>, StoreError>;
    fn matched_transaction_ids(&self, kind: TransactionKind)
        -> Result<HashSet<TransactionId>, StoreError>;

    /// Matches whose payout side is one of the given refs
    fn matches_for_payouts(&self, refs: &HashSet<PayoutRef>)
        -> Result<Vec<MatchRecord>, StoreError>;

    fn list_matches(&self, filter: &MatchFilter, page: usize, per_page: usize)
        -> Result<MatchPage, StoreError>;
}

/// Everything the engine and gateway need from one storage handle
pub trait Store:
    CabinetStore + PayoutStore + TransactionStore + SyncOrderStore + MatchStore
{
}

impl<T> Store for T where
    T: CabinetStore + PayoutStore + TransactionStore + SyncOrderStore + MatchStore
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_range_validation() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(DateRange::new(a, b).is_some());
        assert!(DateRange::new(b, a).is_none());

        let range = DateRange::new(a, b).unwrap();
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert!(!range.contains(b + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_scope_unrestricted() {
        let scope = Scope::unrestricted();
        assert!(scope.includes_cabinet(CabinetId::new()));
        assert!(scope.includes_user(42));
    }

    #[test]
    fn test_scope_narrowed() {
        let cabinet = CabinetId::new();
        let scope = Scope {
            cabinet_ids: Some([cabinet].into_iter().collect()),
            user_ids: Some([1u64].into_iter().collect()),
        };
        assert!(scope.includes_cabinet(cabinet));
        assert!(!scope.includes_cabinet(CabinetId::new()));
        assert!(scope.includes_user(1));
        assert!(!scope.includes_user(2));
    }
}
