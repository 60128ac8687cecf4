//! External payout records and cabinets
//!
//! A payout record is one settlement entry pulled from the upstream
//! payment panel. Records are append-only: once ingested they are never
//! mutated (updates upstream are not re-synced).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CabinetId, ExternalId, PayoutRef};
use crate::money::Money;

/// One settlement entry from the upstream panel.
///
/// Invariant: `(external_id, cabinet_id)` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPayoutRecord {
    /// Source-assigned id, unique only within a cabinet
    pub external_id: ExternalId,
    /// Owning credential group
    pub cabinet_id: CabinetId,
    pub wallet: String,
    pub payment_method_id: Option<u32>,
    /// Per-currency, per-role requested amount
    pub amount: Money,
    /// Per-currency, per-role settled total (the income side of a match)
    pub total: Money,
    /// Upstream status code
    pub status: u16,
    /// Authoritative settlement time; unapproved payouts carry None
    pub approved_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    /// Source-reported timestamps, kept verbatim
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_updated_at: Option<DateTime<Utc>>,
    /// Opaque upstream fields we carry but do not interpret
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl ExternalPayoutRecord {
    /// Composite key of this record
    pub fn payout_ref(&self) -> PayoutRef {
        PayoutRef::new(self.external_id.clone(), self.cabinet_id)
    }

    /// Requested amount at the fixed settlement sub-key
    pub fn settlement_amount(&self) -> Option<Decimal> {
        self.amount.settlement_amount()
    }

    /// Settled total at the fixed settlement sub-key (match income)
    pub fn settlement_total(&self) -> Option<Decimal> {
        self.total.settlement_amount()
    }
}

/// One external credential set; owns 0..N payout records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    pub id: CabinetId,
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    pub created_at: DateTime<Utc>,
}

impl Cabinet {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            id: CabinetId::new(),
            name: name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            created_at: Utc::now(),
        }
    }

    /// Two cabinets with the same credential pair are duplicates
    pub fn same_credentials(&self, other: &Cabinet) -> bool {
        self.api_key == other.api_key && self.api_secret == other.api_secret
    }
}
