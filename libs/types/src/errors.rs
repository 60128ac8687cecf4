//! Error taxonomy for the reconciliation engine
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Top-level reconciliation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Transient storage failure: {0}")]
    TransientStorage(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Upstream API failures that are terminal for a call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("authentication rejected with status {status}")]
    AuthRejected { status: u16 },

    #[error("missing session artifact: {artifact}")]
    MissingSessionArtifact { artifact: String },

    #[error("unexpected status {status} fetching page {page}")]
    BadStatus { status: u16, page: u32 },

    #[error("unrecognized response envelope: {detail}")]
    BadEnvelope { detail: String },

    #[error("transport failure: {detail}")]
    Transport { detail: String },
}

/// Per-record parse failures — skip the record, never the batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed money map: {detail}")]
    MalformedMoney { detail: String },

    #[error("malformed payout record: {detail}")]
    MalformedRecord { detail: String },
}
