//! Raw upstream rows and their normalization
//!
//! The listing endpoint returns loosely shaped rows: ids arrive as
//! numbers or strings, money maps are dynamic JSON. Normalization into
//! [`ExternalPayoutRecord`] happens here, exactly once — a record that
//! fails is skipped and logged, never the whole page.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use types::errors::ParseError;
use types::ids::{CabinetId, ExternalId};
use types::money::Money;
use types::payout::ExternalPayoutRecord;

/// One row as the panel sends it
#[derive(Debug, Clone, Deserialize)]
pub struct RawPayoutRecord {
    /// Source-assigned id; number or string depending on panel version
    pub id: serde_json::Value,
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<u32>,
    /// Dynamic per-currency/per-role map
    pub amount: serde_json::Value,
    /// Dynamic per-currency/per-role settled total
    pub total: serde_json::Value,
    pub status: u16,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Everything else the panel includes, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawPayoutRecord {
    /// Normalize one raw row into a typed, append-ready record.
    ///
    /// Money maps are parsed here and never re-parsed downstream.
    pub fn normalize(self, cabinet_id: CabinetId) -> Result<ExternalPayoutRecord, ParseError> {
        let external_id = external_id(&self.id)?;
        let amount = Money::parse(&self.amount)?;
        let total = Money::parse(&self.total)?;

        Ok(ExternalPayoutRecord {
            external_id,
            cabinet_id,
            wallet: self.wallet.unwrap_or_default(),
            payment_method_id: self.payment_method_id,
            amount,
            total,
            status: self.status,
            approved_at: self.approved_at,
            expired_at: self.expired_at,
            source_created_at: self.created_at,
            source_updated_at: self.updated_at,
            extra: serde_json::Value::Object(self.extra),
        })
    }
}

fn external_id(value: &serde_json::Value) -> Result<ExternalId, ParseError> {
    match value {
        serde_json::Value::Number(n) => Ok(ExternalId::new(n.to_string())),
        serde_json::Value::String(s) if !s.is_empty() => Ok(ExternalId::new(s.clone())),
        other => Err(ParseError::MalformedRecord {
            detail: format!("unusable id: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn raw(id: serde_json::Value, amount: serde_json::Value) -> RawPayoutRecord {
        serde_json::from_value(json!({
            "id": id,
            "wallet": "79990001122",
            "payment_method_id": 2,
            "amount": amount,
            "total": { "643": { "trader": "504.5" } },
            "status": 5,
            "approved_at": "2024-01-01T10:00:00Z",
            "recipient_card": "masked"
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_numeric_id() {
        let cabinet = CabinetId::new();
        let record = raw(json!(4821), json!({ "643": { "trader": "500.00" } }))
            .normalize(cabinet)
            .unwrap();
        assert_eq!(record.external_id, ExternalId::new("4821"));
        assert_eq!(record.cabinet_id, cabinet);
        assert_eq!(record.settlement_amount(), Some(Decimal::new(50000, 2)));
        assert_eq!(record.settlement_total(), Some(Decimal::new(5045, 1)));
        // Unknown upstream fields survive in extra
        assert_eq!(record.extra["recipient_card"], json!("masked"));
    }

    #[test]
    fn test_normalize_string_id() {
        let record = raw(json!("4821"), json!({ "643": { "trader": "1" } }))
            .normalize(CabinetId::new())
            .unwrap();
        assert_eq!(record.external_id, ExternalId::new("4821"));
    }

    #[test]
    fn test_normalize_rejects_bad_id() {
        let err = raw(json!(null), json!({ "643": { "trader": "1" } })).normalize(CabinetId::new());
        assert!(matches!(err, Err(ParseError::MalformedRecord { .. })));
    }

    #[test]
    fn test_normalize_rejects_bad_money() {
        let err = raw(json!(1), json!("broken")).normalize(CabinetId::new());
        assert!(matches!(err, Err(ParseError::MalformedMoney { .. })));
    }
}
