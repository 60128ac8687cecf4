//! Matching rules
//!
//! - `eligibility`: the amount/time predicate between a payout and an
//!   internal transaction
//! - `executor`: builds the persisted match record for a committed pair

pub mod eligibility;
pub mod executor;
