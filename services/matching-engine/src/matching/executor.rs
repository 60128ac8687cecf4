//! Pair commitment
//!
//! Turns a chosen (payout, transaction) pair into the persisted match
//! record, deriving the financial metrics.

use types::matching::{compute_metrics, MatchRecord};
use types::transaction::MatchCandidate;

use crate::matching::eligibility::{time_difference_secs, PayoutCandidate};

/// Build the match record for a committed pair.
///
/// Metrics come from [`compute_metrics`]: the wallet variant pays the
/// 0.9% commission on the expense side, the P2P variant does not.
pub fn build_match(payout: &PayoutCandidate, tx: &MatchCandidate, manual: bool) -> MatchRecord {
    let metrics = compute_metrics(tx.kind, tx.amount, payout.income);
    let time_difference = time_difference_secs(payout, tx).abs();
    MatchRecord::new(
        payout.payout.clone(),
        tx.id,
        tx.kind,
        time_difference,
        metrics,
        manual,
    )
}
