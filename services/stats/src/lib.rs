//! Aggregation and stats over a date range and scope
//!
//! Counts are derived from relation existence against the match table —
//! never from a cached "matched" flag — and both sides' settlement
//! times go through the same normalization the matcher uses, so
//! filtering, matching, and reporting can never disagree.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use store::{with_retry, DateRange, RetryPolicy, Scope, Store};
use types::errors::ReconError;
use types::transaction::TransactionKind;

/// Counts for one side (payouts or internal transactions).
///
/// Invariant: `matched + unmatched == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCounts {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl SideCounts {
    fn split(total: usize, matched: usize) -> Self {
        Self {
            total,
            matched,
            unmatched: total - matched,
        }
    }
}

/// Financial roll-up and counts for a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub payouts: SideCounts,
    pub transactions: SideCounts,
    pub match_count: usize,
    pub total_expense: Decimal,
    pub total_income: Decimal,
    pub total_profit: Decimal,
    /// Expense-weighted average profit percentage; zero when no expense
    pub weighted_profit_percentage: Decimal,
}

/// Stats reader over the shared store
pub struct StatsService<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: Store> StatsService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Compute period stats.
    ///
    /// Degrades to zeroed results on storage failure — reporting must
    /// not take the admin panel down with it.
    pub async fn period_stats(
        &self,
        range: &DateRange,
        scope: &Scope,
        kind: TransactionKind,
    ) -> PeriodStats {
        match self.period_stats_inner(range, scope, kind).await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(%err, "stats computation failed, returning zeroed results");
                PeriodStats::default()
            }
        }
    }

    async fn period_stats_inner(
        &self,
        range: &DateRange,
        scope: &Scope,
        kind: TransactionKind,
    ) -> Result<PeriodStats, ReconError> {
        let payouts = with_retry(&self.retry, "payouts", || {
            self.store.payouts_in_range(range, scope)
        })
        .await?;
        let candidates = with_retry(&self.retry, "transactions", || {
            self.store.candidates_in_range(kind, range, scope)
        })
        .await?;
        let matched_payouts = with_retry(&self.retry, "matches", || {
            self.store.matched_payout_refs()
        })
        .await?;
        let matched_txs = with_retry(&self.retry, "matches", || {
            self.store.matched_transaction_ids(kind)
        })
        .await?;

        let payout_refs_in_range: std::collections::HashSet<_> =
            payouts.iter().map(|p| p.payout_ref()).collect();
        let payouts_matched = payout_refs_in_range
            .iter()
            .filter(|r| matched_payouts.contains(*r))
            .count();
        let txs_matched = candidates
            .iter()
            .filter(|c| matched_txs.contains(&c.id))
            .count();

        // Roll-ups cover the matches whose payout side is in range
        let matches = with_retry(&self.retry, "matches", || {
            self.store.matches_for_payouts(&payout_refs_in_range)
        })
        .await?;

        let total_expense: Decimal = matches.iter().map(|m| m.gross_expense).sum();
        let total_income: Decimal = matches.iter().map(|m| m.gross_income).sum();
        let total_profit: Decimal = matches.iter().map(|m| m.gross_profit).sum();
        let weighted_profit_percentage = if total_expense.is_zero() {
            Decimal::ZERO
        } else {
            total_profit / total_expense * Decimal::ONE_HUNDRED
        };

        Ok(PeriodStats {
            payouts: SideCounts::split(payouts.len(), payouts_matched),
            transactions: SideCounts::split(candidates.len(), txs_matched),
            match_count: matches.len(),
            total_expense,
            total_income,
            total_profit,
            weighted_profit_percentage,
        })
    }
}
