//! Settlement-time normalization
//!
//! The P2P export stores its authoritative order time inside the opaque
//! `payload` blob (epoch milliseconds under `createDate`), shifted three
//! hours behind the stored column. Every reader of a P2P timestamp —
//! range filtering, sorting, matching, stats — goes through
//! [`p2p_settlement_time`] so the correction can never be applied in one
//! place and skipped in another.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::transaction::P2POrderTransaction;

/// Payload key holding the authoritative P2P order time (epoch ms)
pub const P2P_PAYLOAD_TIME_KEY: &str = "createDate";

/// Fixed correction applied to the payload time
pub fn p2p_time_offset() -> Duration {
    Duration::hours(3)
}

/// The authoritative settlement time of a P2P order transaction.
///
/// Prefers the embedded payload timestamp (corrected by +3h); falls back
/// to the stored `date_time` column when the payload has no usable value.
pub fn p2p_settlement_time(tx: &P2POrderTransaction) -> DateTime<Utc> {
    payload_time(&tx.payload)
        .map(|t| t + p2p_time_offset())
        .unwrap_or(tx.date_time)
}

fn payload_time(payload: &serde_json::Value) -> Option<DateTime<Utc>> {
    let raw = payload.get(P2P_PAYLOAD_TIME_KEY)?;
    let millis = match raw {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse::<i64>().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TransactionId;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn p2p_tx(payload: serde_json::Value) -> P2POrderTransaction {
        P2POrderTransaction {
            id: TransactionId::new(),
            user_id: 7,
            total_price: Decimal::from(100),
            date_time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            order_no: "ord-1".to_string(),
            counterparty: "cp".to_string(),
            payload,
        }
    }

    #[test]
    fn test_payload_time_corrected_by_three_hours() {
        // 2024-01-01T09:00:00Z in millis
        let tx = p2p_tx(json!({ "createDate": 1704099600000i64 }));
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(p2p_settlement_time(&tx), expected);
    }

    #[test]
    fn test_payload_time_as_string() {
        let tx = p2p_tx(json!({ "createDate": "1704099600000" }));
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(p2p_settlement_time(&tx), expected);
    }

    #[test]
    fn test_fallback_to_stored_column() {
        let tx = p2p_tx(json!({}));
        assert_eq!(p2p_settlement_time(&tx), tx.date_time);

        let tx = p2p_tx(json!({ "createDate": "not-a-number" }));
        assert_eq!(p2p_settlement_time(&tx), tx.date_time);
    }
}
