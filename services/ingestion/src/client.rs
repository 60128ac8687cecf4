//! Upstream panel HTTP client
//!
//! Session-cookie authentication plus paginated payout listing. Both
//! calls share the 429 backoff discipline from [`crate::backoff`]; any
//! other non-success status is terminal for that call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER, SET_COOKIE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use types::errors::{ReconError, UpstreamError};
use types::payout::Cabinet;

use crate::config::IngestionConfig;
use crate::records::RawPayoutRecord;

/// Cookie name of the upstream session id
const SESSION_COOKIE: &str = "sid";

/// An authenticated upstream session.
///
/// Both artifacts are required: the session cookie and the API token the
/// login response carries in its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub cookie: String,
    pub token: String,
}

/// One decoded listing page. Rows the panel sent but we could not decode
/// are counted, not silently dropped; the count also keeps the page's
/// true length intact for the sync loop's termination logic.
#[derive(Debug, Clone, Default)]
pub struct PayoutPage {
    pub rows: Vec<RawPayoutRecord>,
    pub undecodable: usize,
}

impl PayoutPage {
    /// Rows as the panel counted them, decodable or not
    pub fn source_len(&self) -> usize {
        self.rows.len() + self.undecodable
    }
}

/// Source of payout pages — the seam between the sync loop and HTTP.
#[async_trait]
pub trait PayoutSource: Send + Sync {
    async fn authenticate(&self, cabinet: &Cabinet) -> Result<Session, ReconError>;
    async fn fetch_page(&self, session: &Session, page: u32) -> Result<PayoutPage, ReconError>;
}

/// reqwest-backed client for the payment panel
pub struct PanelClient {
    http: reqwest::Client,
    config: IngestionConfig,
}

impl PanelClient {
    pub fn new(config: IngestionConfig) -> Result<Self, ReconError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpstreamError::Transport { detail: e.to_string() })?;
        Ok(Self { http, config })
    }

    /// Run one upstream request with the 429 backoff discipline.
    ///
    /// `send` is re-invoked per attempt; any non-429 error it returns is
    /// terminal. Exhausting the attempt budget yields `RateLimited`.
    async fn with_backoff<T, F, Fut>(&self, what: &str, mut send: F) -> Result<T, ReconError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Attempt>>,
    {
        let policy = self.config.backoff;
        let mut attempt = 1;
        loop {
            match send().await {
                Ok(value) => return Ok(value),
                Err(Attempt::RateLimited { retry_after }) => {
                    if !policy.allows_retry(attempt) {
                        warn!(what, attempt, "rate limit budget exhausted");
                        return Err(ReconError::RateLimited { attempts: attempt });
                    }
                    let delay = policy.delay_for(attempt, retry_after);
                    debug!(what, attempt, delay_ms = delay.as_millis() as u64,
                        "upstream 429, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Terminal(err)) => return Err(err.into()),
            }
        }
    }
}

/// Outcome of a single upstream attempt
enum Attempt {
    RateLimited { retry_after: Option<Duration> },
    Terminal(UpstreamError),
}

#[async_trait]
impl PayoutSource for PanelClient {
    async fn authenticate(&self, cabinet: &Cabinet) -> Result<Session, ReconError> {
        let url = format!("{}/api/auth/login", self.config.base_url);
        let body = serde_json::json!({
            "api_key": cabinet.api_key,
            "api_secret": cabinet.api_secret,
        });

        self.with_backoff("authenticate", || {
            let url = url.clone();
            let body = body.clone();
            async move {
                let response = self
                    .http
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| Attempt::Terminal(UpstreamError::Transport { detail: e.to_string() }))?;

                match response.status() {
                    StatusCode::TOO_MANY_REQUESTS => Err(Attempt::RateLimited {
                        retry_after: retry_after(response.headers()),
                    }),
                    status if status.is_success() => {
                        let cookie = session_cookie(response.headers());
                        let body: serde_json::Value = response.json().await.map_err(|e| {
                            Attempt::Terminal(UpstreamError::Transport { detail: e.to_string() })
                        })?;
                        session_from_parts(cookie, &body).map_err(Attempt::Terminal)
                    }
                    status => Err(Attempt::Terminal(UpstreamError::AuthRejected {
                        status: status.as_u16(),
                    })),
                }
            }
        })
        .await
    }

    async fn fetch_page(&self, session: &Session, page: u32) -> Result<PayoutPage, ReconError> {
        let url = format!("{}/api/payouts", self.config.base_url);
        let statuses = self
            .config
            .status_filter
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");

        self.with_backoff("fetch_page", || {
            let url = url.clone();
            let statuses = statuses.clone();
            async move {
                let response = self
                    .http
                    .get(&url)
                    .header("Cookie", format!("{SESSION_COOKIE}={}", session.cookie))
                    .header("Authorization", format!("Bearer {}", session.token))
                    .query(&[
                        ("page", page.to_string()),
                        ("per_page", self.config.page_size.to_string()),
                        ("status", statuses),
                    ])
                    .send()
                    .await
                    .map_err(|e| Attempt::Terminal(UpstreamError::Transport { detail: e.to_string() }))?;

                match response.status() {
                    StatusCode::TOO_MANY_REQUESTS => Err(Attempt::RateLimited {
                        retry_after: retry_after(response.headers()),
                    }),
                    status if status.is_success() => {
                        let body: serde_json::Value = response.json().await.map_err(|e| {
                            Attempt::Terminal(UpstreamError::Transport { detail: e.to_string() })
                        })?;
                        let rows = unwrap_envelope(body).map_err(Attempt::Terminal)?;
                        Ok(decode_rows(rows, page))
                    }
                    status => Err(Attempt::Terminal(UpstreamError::BadStatus {
                        status: status.as_u16(),
                        page,
                    })),
                }
            }
        })
        .await
    }
}

/// Parse a Retry-After header (seconds form) if present
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Extract the session cookie value from Set-Cookie headers
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().find_map(|value| {
        let raw = value.to_str().ok()?;
        let pair = raw.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Both session artifacts are required; a login that omits either fails
fn session_from_parts(
    cookie: Option<String>,
    body: &serde_json::Value,
) -> Result<Session, UpstreamError> {
    let cookie = cookie.ok_or_else(|| UpstreamError::MissingSessionArtifact {
        artifact: "session cookie".to_string(),
    })?;
    let token = body
        .get("token")
        .or_else(|| body.get("result").and_then(|r| r.get("token")))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| UpstreamError::MissingSessionArtifact {
            artifact: "api token".to_string(),
        })?;
    Ok(Session {
        cookie,
        token: token.to_string(),
    })
}

/// Accept both listing envelopes: a flat array, or an object with the
/// array nested under `result`. Anything else is terminal for the call.
fn unwrap_envelope(body: serde_json::Value) -> Result<Vec<serde_json::Value>, UpstreamError> {
    match body {
        serde_json::Value::Array(rows) => Ok(rows),
        serde_json::Value::Object(mut obj) => match obj.remove("result") {
            Some(serde_json::Value::Array(rows)) => Ok(rows),
            Some(other) => Err(UpstreamError::BadEnvelope {
                detail: format!("result is not an array: {other}"),
            }),
            None => Err(UpstreamError::BadEnvelope {
                detail: "object without result array".to_string(),
            }),
        },
        other => Err(UpstreamError::BadEnvelope {
            detail: format!("unexpected body: {other}"),
        }),
    }
}

/// Decode listing rows, counting (and logging) malformed ones
fn decode_rows(rows: Vec<serde_json::Value>, page: u32) -> PayoutPage {
    let mut decoded = PayoutPage::default();
    for row in rows {
        match serde_json::from_value::<RawPayoutRecord>(row) {
            Ok(record) => decoded.rows.push(record),
            Err(err) => {
                warn!(page, %err, "skipping undecodable payout row");
                decoded.undecodable += 1;
            }
        }
    }
    decoded
}
