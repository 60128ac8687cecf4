//! Reconciliation matching engine
//!
//! Pairs unmatched payout records with unmatched internal transactions
//! of one chosen kind using an amount-equality + time-window rule, and
//! persists all pairs found in a run as one idempotent batch.

pub mod engine;
pub mod matching;
pub mod summary;

pub use engine::{MatchEngine, MatchRunParams};
pub use matching::eligibility::{amount_tolerance, time_window, PayoutCandidate};
pub use summary::RunSummary;
