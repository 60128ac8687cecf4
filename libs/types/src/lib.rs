//! Types library for the transaction reconciliation engine
//!
//! This library provides all core type definitions shared by the ingestion,
//! matching, and stats services, ensuring type safety and deterministic
//! decimal arithmetic end to end.
//!
//! # Version
//! v1.0.0 - Frozen
//!
//! # Modules
//! - `ids`: Unique identifiers (CabinetId, MatchId, SyncOrderId, TransactionId, ExternalId)
//! - `money`: Nested per-currency/per-role settlement amounts
//! - `time`: Settlement-time normalization
//! - `payout`: External payout records and cabinets
//! - `sync`: Sync order lifecycle
//! - `transaction`: Internal wallet / P2P transaction rows
//! - `matching`: Match records and financial metrics
//! - `errors`: Error taxonomy

// Public modules
pub mod errors;
pub mod ids;
pub mod matching;
pub mod money;
pub mod payout;
pub mod sync;
pub mod time;
pub mod transaction;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::matching::*;
    pub use crate::money::*;
    pub use crate::payout::*;
    pub use crate::sync::*;
    pub use crate::time::*;
    pub use crate::transaction::*;
}
