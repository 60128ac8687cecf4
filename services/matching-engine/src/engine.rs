//! Matching engine core
//!
//! Coordinates one matching run: select eligible unmatched records,
//! pair them greedily by nearest settlement time, commit the whole
//! batch at the end.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use store::{with_retry, DateRange, RetryPolicy, Scope, Store};
use types::errors::ReconError;
use types::ids::{MatchId, PayoutRef, TransactionId};
use types::matching::MatchRecord;
use types::transaction::{MatchCandidate, TransactionKind};

use crate::matching::eligibility::{eligible, time_difference_secs, PayoutCandidate};
use crate::matching::executor;
use crate::summary::RunSummary;

/// Parameters of one matching run
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRunParams {
    /// Settlement-time window applied to both sides
    pub range: DateRange,
    /// Which internal-transaction table to pair against
    pub kind: TransactionKind,
    /// Optional cabinet/user narrowing
    pub scope: Scope,
}

/// The reconciliation matching engine
pub struct MatchEngine<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: Store> MatchEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Run the batch matcher over a window.
    ///
    /// Greedy nearest-time: payouts are visited in ascending approval
    /// time (external id as tie-break); each takes the eligible
    /// transaction with the smallest |Δt| and both are consumed
    /// immediately. This is deliberately order-dependent and NOT a
    /// globally optimal assignment — a known, documented limitation.
    ///
    /// All pairs are committed in one batch at the end; a failure
    /// aborts the run with zero new matches and an error flag, never a
    /// partial commit. Pairs another run committed first are skipped
    /// silently by the store's unique indexes, so re-runs are
    /// idempotent.
    pub async fn run(&self, params: &MatchRunParams) -> RunSummary {
        match self.run_inner(params).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(%err, "matching run aborted");
                RunSummary::failed(err.to_string())
            }
        }
    }

    async fn run_inner(&self, params: &MatchRunParams) -> Result<RunSummary, ReconError> {
        let payouts = with_retry(&self.retry, "payouts", || {
            self.store.payouts_in_range(&params.range, &params.scope)
        })
        .await?;
        let matched_payouts = with_retry(&self.retry, "matches", || {
            self.store.matched_payout_refs()
        })
        .await?;
        let matched_txs = with_retry(&self.retry, "matches", || {
            self.store.matched_transaction_ids(params.kind)
        })
        .await?;
        let candidates = with_retry(&self.retry, "transactions", || {
            self.store
                .candidates_in_range(params.kind, &params.range, &params.scope)
        })
        .await?;

        let batch = plan_pairs(&payouts, &matched_payouts, &candidates, &matched_txs);
        debug!(
            kind = %params.kind,
            payouts = payouts.len(),
            candidates = candidates.len(),
            planned = batch.len(),
            "matching scan complete"
        );

        // Single end-of-run commit
        let outcome = with_retry(&self.retry, "matches", || {
            self.store.insert_matches(batch.clone())
        })
        .await?;

        let summary = RunSummary::from_inserted(&outcome.inserted, outcome.skipped_duplicates);
        info!(
            kind = %params.kind,
            matched = summary.matched_pairs,
            skipped = summary.skipped_duplicates,
            "matching run committed"
        );
        Ok(summary)
    }

    /// Explicit operator pairing. Rejects with a conflict when either
    /// side already participates in a match; computes the same metrics
    /// as the batch path.
    pub async fn create_manual_match(
        &self,
        payout: &PayoutRef,
        kind: TransactionKind,
        transaction_id: TransactionId,
    ) -> Result<MatchRecord, ReconError> {
        let record = with_retry(&self.retry, "payouts", || self.store.get_payout(payout)).await?;
        let tx = with_retry(&self.retry, "transactions", || {
            self.store.get_candidate(kind, transaction_id)
        })
        .await?;

        let payout_candidate = PayoutCandidate::from_record(&record).ok_or_else(|| {
            ReconError::Validation(format!(
                "payout {payout} has no settlement amount or approval time"
            ))
        })?;

        let record = executor::build_match(&payout_candidate, &tx, true);
        with_retry(&self.retry, "matches", || {
            self.store.insert_match_strict(record.clone())
        })
        .await?;
        info!(payout = %payout, tx = %transaction_id, "manual match created");
        Ok(record)
    }

    /// Hard delete; both source rows become eligible for re-matching.
    pub async fn delete_match(&self, id: MatchId) -> Result<(), ReconError> {
        with_retry(&self.retry, "matches", || self.store.delete_match(id)).await?;
        info!(match_id = %id, "match deleted");
        Ok(())
    }
}

/// The greedy scan, pure over in-memory snapshots.
///
/// Iteration order: payouts ascending by settlement time, then external
/// id — fixed so re-runs over the same data plan identical pairs.
fn plan_pairs(
    payouts: &[types::payout::ExternalPayoutRecord],
    matched_payouts: &HashSet<PayoutRef>,
    candidates: &[MatchCandidate],
    matched_txs: &HashSet<TransactionId>,
) -> Vec<MatchRecord> {
    let mut queue: Vec<PayoutCandidate> = payouts
        .iter()
        .filter(|p| !matched_payouts.contains(&p.payout_ref()))
        .filter_map(PayoutCandidate::from_record)
        .collect();
    queue.sort_by(|a, b| {
        a.settlement_time
            .cmp(&b.settlement_time)
            .then_with(|| a.payout.external_id.cmp(&b.payout.external_id))
    });

    let mut taken: HashSet<TransactionId> = HashSet::new();
    let mut batch = Vec::new();

    for payout in &queue {
        let nearest = candidates
            .iter()
            .filter(|tx| !matched_txs.contains(&tx.id) && !taken.contains(&tx.id))
            .filter(|tx| eligible(payout, tx))
            // Nearest |Δt| wins, transaction id breaks ties
            .min_by_key(|tx| (time_difference_secs(payout, tx).abs(), tx.id));

        if let Some(tx) = nearest {
            taken.insert(tx.id);
            batch.push(executor::build_match(payout, tx, false));
        }
    }
    batch
}
