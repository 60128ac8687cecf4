//! Pair eligibility
//!
//! A payout P and an internal transaction T are eligible when their
//! amounts agree within the tolerance AND their settlement times lie
//! within the window. "Not already matched" is checked by the engine
//! against the match table, and enforced again by the store's unique
//! indexes at commit time.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use types::ids::PayoutRef;
use types::payout::ExternalPayoutRecord;
use types::transaction::MatchCandidate;

/// Maximum allowed |amount(P) − amount(T)|: 0.01
pub fn amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Maximum allowed |settlement(P) − settlement(T)|: 30 minutes
pub fn time_window() -> Duration {
    Duration::minutes(30)
}

/// The payout-side view the matcher works with: normalized amounts and
/// an approval time, extracted once from the stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutCandidate {
    pub payout: PayoutRef,
    /// Requested amount, compared against the transaction amount
    pub amount: Decimal,
    /// Settled total — the income side of the pair's metrics
    pub income: Decimal,
    pub settlement_time: DateTime<Utc>,
}

impl PayoutCandidate {
    /// Build the matcher's view of a record.
    ///
    /// Returns `None` when the record has no approval time or its money
    /// map lacks the settlement sub-key — such records are skipped, they
    /// never abort a run.
    pub fn from_record(record: &ExternalPayoutRecord) -> Option<Self> {
        Some(Self {
            payout: record.payout_ref(),
            amount: record.settlement_amount()?,
            income: record.settlement_total()?,
            settlement_time: record.approved_at?,
        })
    }
}

/// Signed seconds between the two settlement times
pub fn time_difference_secs(payout: &PayoutCandidate, tx: &MatchCandidate) -> i64 {
    (payout.settlement_time - tx.settlement_time).num_seconds()
}

/// The eligibility predicate (amount + time window)
pub fn eligible(payout: &PayoutCandidate, tx: &MatchCandidate) -> bool {
    let amount_ok = (payout.amount - tx.amount).abs() <= amount_tolerance();
    let seconds = time_difference_secs(payout, tx).abs();
    let time_ok = seconds <= time_window().num_seconds();
    amount_ok && time_ok
}
