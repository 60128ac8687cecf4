//! Run summaries

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use types::matching::MatchRecord;

/// Outcome of one matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Pairs committed by this run
    pub matched_pairs: usize,
    /// Pairs this run computed but the store already had (concurrent or
    /// repeated runs)
    pub skipped_duplicates: usize,
    pub total_expense: Decimal,
    pub total_income: Decimal,
    pub total_profit: Decimal,
    /// total_profit / total_expense × 100, zero when expense is zero
    pub blended_profit_percentage: Decimal,
    pub avg_profit_per_pair: Decimal,
    pub avg_expense_per_pair: Decimal,
    /// Set when the run aborted; no partial commit happened
    pub error: Option<String>,
}

impl RunSummary {
    /// Aggregate over the records a run actually committed
    pub fn from_inserted(inserted: &[MatchRecord], skipped_duplicates: usize) -> Self {
        let total_expense: Decimal = inserted.iter().map(|m| m.gross_expense).sum();
        let total_income: Decimal = inserted.iter().map(|m| m.gross_income).sum();
        let total_profit: Decimal = inserted.iter().map(|m| m.gross_profit).sum();

        let blended_profit_percentage = if total_expense.is_zero() {
            Decimal::ZERO
        } else {
            total_profit / total_expense * Decimal::ONE_HUNDRED
        };
        let pairs = Decimal::from(inserted.len());
        let (avg_profit_per_pair, avg_expense_per_pair) = if inserted.is_empty() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (total_profit / pairs, total_expense / pairs)
        };

        Self {
            matched_pairs: inserted.len(),
            skipped_duplicates,
            total_expense,
            total_income,
            total_profit,
            blended_profit_percentage,
            avg_profit_per_pair,
            avg_expense_per_pair,
            error: None,
        }
    }

    /// An aborted run: zero new matches, explicit error flag
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            matched_pairs: 0,
            skipped_duplicates: 0,
            total_expense: Decimal::ZERO,
            total_income: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            blended_profit_percentage: Decimal::ZERO,
            avg_profit_per_pair: Decimal::ZERO,
            avg_expense_per_pair: Decimal::ZERO,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{CabinetId, ExternalId, PayoutRef, TransactionId};
    use types::matching::compute_metrics;
    use types::transaction::TransactionKind;

    fn record(expense: i64, income: i64) -> MatchRecord {
        let metrics = compute_metrics(
            TransactionKind::P2pOrder,
            Decimal::from(expense),
            Decimal::from(income),
        );
        MatchRecord::new(
            PayoutRef::new(ExternalId::new("1"), CabinetId::new()),
            TransactionId::new(),
            TransactionKind::P2pOrder,
            0,
            metrics,
            false,
        )
    }

    #[test]
    fn test_summary_aggregation() {
        let summary = RunSummary::from_inserted(&[record(100, 110), record(100, 90)], 1);
        assert_eq!(summary.matched_pairs, 2);
        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.total_expense, Decimal::from(200));
        assert_eq!(summary.total_income, Decimal::from(200));
        assert_eq!(summary.total_profit, Decimal::ZERO);
        assert_eq!(summary.blended_profit_percentage, Decimal::ZERO);
        assert_eq!(summary.avg_expense_per_pair, Decimal::from(100));
        assert!(summary.error.is_none());
    }

    #[test]
    fn test_empty_run_no_division() {
        let summary = RunSummary::from_inserted(&[], 0);
        assert_eq!(summary.matched_pairs, 0);
        assert_eq!(summary.blended_profit_percentage, Decimal::ZERO);
        assert_eq!(summary.avg_profit_per_pair, Decimal::ZERO);
    }

    #[test]
    fn test_failed_run() {
        let summary = RunSummary::failed("storage down");
        assert_eq!(summary.matched_pairs, 0);
        assert_eq!(summary.error.as_deref(), Some("storage down"));
    }
}
