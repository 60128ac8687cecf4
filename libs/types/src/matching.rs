//! Match records and financial metrics
//!
//! A match links exactly one payout record to exactly one internal
//! transaction of one kind, with derived settlement metrics. Each side
//! may participate in at most one match of its kind; the store enforces
//! this with unique indexes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{MatchId, PayoutRef, TransactionId};
use crate::transaction::TransactionKind;

/// Wallet commission rate applied to the expense side: 0.9%
pub fn wallet_commission_multiplier() -> Decimal {
    // 1.009
    Decimal::new(1009, 3)
}

/// Derived financial metrics of one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    pub gross_expense: Decimal,
    pub gross_income: Decimal,
    pub gross_profit: Decimal,
    pub profit_percentage: Decimal,
}

/// Compute pair metrics from the internal amount and the payout's settled
/// total.
///
/// - Wallet pairs pay the 0.9% wallet commission on the expense side;
///   P2P pairs do not.
/// - `profit_percentage` is exactly zero when the expense is zero (never
///   NaN or infinity — all arithmetic is decimal).
pub fn compute_metrics(kind: TransactionKind, internal_amount: Decimal, payout_income: Decimal) -> MatchMetrics {
    let gross_expense = match kind {
        TransactionKind::Wallet => internal_amount * wallet_commission_multiplier(),
        TransactionKind::P2pOrder => internal_amount,
    };
    let gross_income = payout_income;
    let gross_profit = gross_income - gross_expense;
    let profit_percentage = if gross_expense.is_zero() {
        Decimal::ZERO
    } else {
        gross_profit / gross_expense * Decimal::ONE_HUNDRED
    };

    MatchMetrics {
        gross_expense,
        gross_income,
        gross_profit,
        profit_percentage,
    }
}

/// A persisted 1:1 pairing between a payout record and an internal
/// transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub payout: PayoutRef,
    pub transaction_id: TransactionId,
    pub kind: TransactionKind,
    /// |payout settlement time − transaction settlement time|, seconds
    pub time_difference_secs: i64,
    pub gross_expense: Decimal,
    pub gross_income: Decimal,
    pub gross_profit: Decimal,
    pub profit_percentage: Decimal,
    pub created_at: DateTime<Utc>,
    /// True for matches created by an explicit operator action
    pub manual: bool,
}

impl MatchRecord {
    pub fn new(
        payout: PayoutRef,
        transaction_id: TransactionId,
        kind: TransactionKind,
        time_difference_secs: i64,
        metrics: MatchMetrics,
        manual: bool,
    ) -> Self {
        Self {
            id: MatchId::new(),
            payout,
            transaction_id,
            kind,
            time_difference_secs,
            gross_expense: metrics.gross_expense,
            gross_income: metrics.gross_income,
            gross_profit: metrics.gross_profit,
            profit_percentage: metrics.profit_percentage,
            created_at: Utc::now(),
            manual,
        }
    }
}
