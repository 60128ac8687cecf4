use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store::MatchPage;
use types::ids::{CabinetId, ExternalId, SyncOrderId, TransactionId};
use types::matching::MatchRecord;
use types::sync::SyncStatus;
use types::transaction::TransactionKind;

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRunRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: TransactionKind,
    #[serde(default)]
    pub cabinet_ids: Option<Vec<CabinetId>>,
    #[serde(default)]
    pub user_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMatchesQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub cabinet_id: Option<CabinetId>,
    #[serde(default)]
    pub manual: Option<bool>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPageResponse {
    pub rows: Vec<MatchRecord>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl From<MatchPage> for MatchPageResponse {
    fn from(page: MatchPage) -> Self {
        Self {
            rows: page.rows,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualMatchRequest {
    pub external_id: ExternalId,
    pub cabinet_id: CabinetId,
    pub kind: TransactionKind,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    /// Omitted → sync all cabinets
    #[serde(default)]
    pub cabinet_id: Option<CabinetId>,
    pub page_budget: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub order_id: SyncOrderId,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOrderResponse {
    pub order_id: SyncOrderId,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: TransactionKind,
}

/// Mutation outcome the admin UI renders directly
#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}
