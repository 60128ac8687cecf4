//! Upstream payout ingestion
//!
//! Authenticates against the rate-limited payment panel, pages through
//! payout history with retry/backoff, stops once already-seen data is
//! reached, and persists new records append-only.
//!
//! Two distinct retry disciplines are in play and never share a budget:
//! - HTTP 429 backoff (exponential, Retry-After aware) in [`client`]
//! - transient storage retries (linear, `store::with_retry`) around every
//!   store call made from [`sync`]

pub mod backoff;
pub mod client;
pub mod config;
pub mod records;
pub mod sync;

pub use client::{PanelClient, PayoutPage, PayoutSource, Session};
pub use config::IngestionConfig;
pub use records::RawPayoutRecord;
pub use sync::{CabinetIngest, IngestReport, IngestionService};
