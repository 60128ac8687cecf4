//! Sync order lifecycle
//!
//! A sync order is a tracked request to run ingestion for one or all
//! cabinets. Requests create orders in `Pending`; a worker advances them
//! through `InProgress` into a terminal state. Illegal transitions are
//! rejected rather than silently applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CabinetId, SyncOrderId};

/// Target of one ingestion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncTarget {
    OneCabinet { cabinet_id: CabinetId },
    AllCabinets,
}

/// Sync order state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    /// Created by a request; the only state a request may create
    Pending,
    /// Picked up by the worker
    InProgress,
    /// Terminal: ingestion finished
    Completed,
    /// Terminal: ingestion aborted
    Failed,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }

    /// Validate a lifecycle transition: Pending → InProgress → {Completed, Failed}
    pub fn validate_transition(from: SyncStatus, to: SyncStatus) -> Result<(), SyncOrderError> {
        let ok = matches!(
            (from, to),
            (SyncStatus::Pending, SyncStatus::InProgress)
                | (SyncStatus::InProgress, SyncStatus::Completed)
                | (SyncStatus::InProgress, SyncStatus::Failed)
        );
        if ok {
            Ok(())
        } else {
            Err(SyncOrderError::InvalidTransition { from, to })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncOrderError {
    #[error("invalid sync order transition from {from:?} to {to:?}")]
    InvalidTransition { from: SyncStatus, to: SyncStatus },
}

/// One tracked ingestion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOrder {
    pub id: SyncOrderId,
    pub target: SyncTarget,
    /// Maximum number of upstream pages the run may fetch
    pub page_budget: u32,
    pub status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncOrder {
    /// Create a new order in `Pending` — the only state a request creates
    pub fn new(target: SyncTarget, page_budget: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SyncOrderId::new(),
            target,
            page_budget,
            status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to a new status, validating the transition
    pub fn advance(&mut self, to: SyncStatus) -> Result<(), SyncOrderError> {
        SyncStatus::validate_transition(self.status, to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
