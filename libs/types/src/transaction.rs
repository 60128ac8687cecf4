//! Internal transaction rows — match candidates
//!
//! Both kinds are produced by out-of-scope pipelines (the wallet bot and
//! the P2P trading export); this system only reads them. The P2P row's
//! authoritative time may live inside its opaque payload, see
//! [`crate::time::p2p_settlement_time`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::TransactionId;

/// Which internal-transaction table a match candidate comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Wallet,
    P2pOrder,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Wallet => write!(f, "wallet"),
            TransactionKind::P2pOrder => write!(f, "p2p_order"),
        }
    }
}

/// A wallet transaction recorded by the bot pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalWalletTransaction {
    pub id: TransactionId,
    pub user_id: u64,
    pub total_price: Decimal,
    /// Authoritative settlement time (stored directly for wallet rows)
    pub date_time: DateTime<Utc>,
    pub external_id: Option<String>,
    pub order_no: Option<String>,
    pub counterparty: Option<String>,
}

/// A P2P order transaction from the trading-platform export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P2POrderTransaction {
    pub id: TransactionId,
    pub user_id: u64,
    pub total_price: Decimal,
    /// Stored column; the authoritative time may instead sit in `payload`
    pub date_time: DateTime<Utc>,
    pub order_no: String,
    pub counterparty: String,
    /// Opaque export blob; may hold the real order time under `createDate`
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A normalized view of either kind, as seen by the matching engine:
/// one amount, one settlement time, one id.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub user_id: u64,
    pub amount: Decimal,
    pub settlement_time: DateTime<Utc>,
}

impl MatchCandidate {
    pub fn from_wallet(tx: &InternalWalletTransaction) -> Self {
        Self {
            id: tx.id,
            kind: TransactionKind::Wallet,
            user_id: tx.user_id,
            amount: tx.total_price,
            settlement_time: tx.date_time,
        }
    }

    pub fn from_p2p(tx: &P2POrderTransaction) -> Self {
        Self {
            id: tx.id,
            kind: TransactionKind::P2pOrder,
            user_id: tx.user_id,
            amount: tx.total_price,
            settlement_time: crate::time::p2p_settlement_time(tx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_wallet_candidate_uses_stored_time() {
        let tx = InternalWalletTransaction {
            id: TransactionId::new(),
            user_id: 1,
            total_price: Decimal::from(500),
            date_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap(),
            external_id: None,
            order_no: None,
            counterparty: None,
        };
        let c = MatchCandidate::from_wallet(&tx);
        assert_eq!(c.kind, TransactionKind::Wallet);
        assert_eq!(c.settlement_time, tx.date_time);
        assert_eq!(c.amount, Decimal::from(500));
    }

    #[test]
    fn test_p2p_candidate_uses_normalized_time() {
        let tx = P2POrderTransaction {
            id: TransactionId::new(),
            user_id: 1,
            total_price: Decimal::from(500),
            date_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            order_no: "o".to_string(),
            counterparty: "c".to_string(),
            // 2024-01-01T09:00:00Z → corrected to 12:00Z
            payload: json!({ "createDate": 1704099600000i64 }),
        };
        let c = MatchCandidate::from_p2p(&tx);
        assert_eq!(c.kind, TransactionKind::P2pOrder);
        assert_eq!(
            c.settlement_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }
}
