//! Ingestion configuration

use std::time::Duration;

use store::RetryPolicy;

use crate::backoff::BackoffPolicy;

/// Configuration for the ingestion client and sync loop
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Upstream panel base URL
    pub base_url: String,
    /// Records per listing page
    pub page_size: u32,
    /// Fixed delay between page requests, to avoid tripping the
    /// upstream rate limit pre-emptively
    pub inter_page_delay: Duration,
    /// Upstream status codes requested from the listing endpoint
    /// (settled payouts only)
    pub status_filter: Vec<u16>,
    /// HTTP 429 backoff for auth and page fetches
    pub backoff: BackoffPolicy,
    /// Transient-storage retry budget (separate from `backoff`)
    pub storage_retry: RetryPolicy,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://panel.example.com".to_string(),
            page_size: 50,
            inter_page_delay: Duration::from_millis(1500),
            status_filter: vec![5],
            backoff: BackoffPolicy::default(),
            storage_retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
