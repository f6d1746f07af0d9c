use crate::client::error_classification::{classify_status, Phase};
use crate::client::policy::{Decision, PolicyEngine};
use crate::client::preflight::{header_first, retry_after_ms, UPSTREAM_ID_HEADERS};
use crate::client::signals::{InflightSnapshot, SignalsSnapshot};
use crate::client::types::CallStats;
use crate::pipeline::Pipeline;
use crate::resilience::rate_limiter::RateLimiter;
use crate::transport::HttpTransport;
use crate::types::{HistoryItem, HistoryPage, Quota};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound the vendor accepts for `page_size`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Client for the GenAIPro VEO API.
///
/// Cheap to clone; clones share the connection pool, rate limiter and
/// inflight permits.
#[derive(Clone)]
pub struct VeoClient {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) pipeline: Pipeline,
    pub(crate) policy: PolicyEngine,
    pub(crate) inflight: Option<Arc<tokio::sync::Semaphore>>,
    pub(crate) max_inflight: Option<usize>,
    pub(crate) rate_limiter: Option<Arc<RateLimiter>>,
    pub(crate) max_upload_bytes: u64,
}

impl VeoClient {
    /// Build a client from `VEO_*` environment variables and the keyring.
    pub fn from_env() -> Result<Self> {
        crate::client::builder::VeoClientBuilder::from_settings(&crate::config::Settings::from_env()?)
            .build()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Snapshot current runtime signals (facts only).
    pub async fn signals(&self) -> SignalsSnapshot {
        let inflight = self.inflight.as_ref().and_then(|sem| {
            let max = self.max_inflight?;
            let available = sem.available_permits();
            Some(InflightSnapshot {
                max,
                available,
                in_use: max.saturating_sub(available),
            })
        });
        let rate_limiter = match &self.rate_limiter {
            Some(rl) => Some(rl.snapshot().await),
            None => None,
        };
        SignalsSnapshot {
            inflight,
            rate_limiter,
        }
    }

    /// Current credit quota (`GET /veo/me`).
    pub async fn quota(&self) -> Result<Quota> {
        Ok(self.get_json("/veo/me", &[]).await?.0)
    }

    /// One page of generation history (`GET /veo/histories`).
    ///
    /// `page` is raised to at least 1 and `page_size` clamped to `1..=100`.
    pub async fn histories(&self, page: u32, page_size: u32) -> Result<HistoryPage> {
        let query = [
            ("page", page.max(1).to_string()),
            ("page_size", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        Ok(self.get_json("/veo/histories", &query).await?.0)
    }

    /// First item on the newest history page whose prompt matches `prompt`.
    ///
    /// Used to recover a result when its event stream was lost.
    pub async fn find_in_history(
        &self,
        prompt: &str,
        page_size: u32,
    ) -> Result<Option<HistoryItem>> {
        let page = self.histories(1, page_size).await?;
        Ok(page.data.into_iter().find(|item| item.matches_prompt(prompt)))
    }

    /// Download a generated asset.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let parsed = url::Url::parse(url).map_err(|e| {
            Error::validation_with_context(
                format!("invalid download url: {}", e),
                ErrorContext::new().with_field_path("url").with_details(url),
            )
        })?;
        let bytes = self.transport.download(parsed.as_str()).await?;
        debug!(url, bytes = bytes.len(), "downloaded asset");
        Ok(bytes)
    }

    /// GET a JSON document with the retry policy applied.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, CallStats)> {
        let start = std::time::Instant::now();
        let client_request_id = Uuid::new_v4().to_string();
        let mut attempt = 0u32;

        loop {
            let permit = self.preflight().await?;
            let outcome = self.transport.get(path, query, &client_request_id).await;

            let err = match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let http_status = resp.status().as_u16();
                    let upstream_request_id = header_first(resp.headers(), UPSTREAM_ID_HEADERS);
                    let body = resp
                        .bytes()
                        .await
                        .map_err(|e| Error::Transport(crate::transport::TransportError::Http(e)))?;
                    let value: T = serde_json::from_slice(&body)?;
                    let stats = CallStats {
                        endpoint: path.to_string(),
                        http_status,
                        retry_count: attempt,
                        duration_ms: start.elapsed().as_millis(),
                        client_request_id,
                        upstream_request_id,
                        signals: self.signals().await,
                    };
                    debug!(
                        endpoint = path,
                        http_status,
                        retry_count = attempt,
                        duration_ms = stats.duration_ms,
                        "request succeeded"
                    );
                    return Ok((value, stats));
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let retry_after = retry_after_ms(resp.headers());
                    let body = resp.text().await.unwrap_or_default();
                    info!(
                        http_status = status,
                        endpoint = path,
                        attempt,
                        duration_ms = start.elapsed().as_millis(),
                        "request failed"
                    );
                    if status == 429 {
                        self.note_rate_limited(retry_after).await;
                    }
                    classify_status(status, &body, retry_after, &client_request_id, Phase::Request)
                }
                Err(e) => e,
            };
            // Free the inflight slot before any backoff sleep.
            drop(permit);

            match self.policy.decide(&err, attempt) {
                Decision::Retry { delay } => {
                    warn!(
                        endpoint = path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Decision::Fail => return Err(self.policy.exhausted(err, &client_request_id)),
            }
        }
    }
}
