//! Preflight checks and response header helpers

use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;

use super::core::VeoClient;

/// Headers the vendor (or its CDN) may use to identify a request.
pub(crate) const UPSTREAM_ID_HEADERS: &[&str] = &["x-request-id", "request-id", "cf-ray"];

impl VeoClient {
    /// Unified policy preflight for a request:
    /// - rate limiter (optional)
    /// - inflight backpressure permit (optional)
    ///
    /// The permit is held for the whole call or stream lifetime.
    pub(crate) async fn preflight(&self) -> Result<Option<OwnedSemaphorePermit>> {
        if let Some(rl) = &self.rate_limiter {
            rl.acquire().await?;
        }
        if let Some(sem) = &self.inflight {
            return Ok(Some(sem.clone().acquire_owned().await.map_err(|_| {
                Error::configuration_with_context(
                    "Backpressure semaphore closed",
                    ErrorContext::new().with_source("backpressure"),
                )
            })?));
        }
        Ok(None)
    }

    /// Pause the shared limiter when the vendor asked us to back off.
    pub(crate) async fn note_rate_limited(&self, retry_after_ms: Option<u64>) {
        if let (Some(rl), Some(ms)) = (&self.rate_limiter, retry_after_ms) {
            rl.block_for(Duration::from_millis(ms)).await;
        }
    }
}

/// Extract the first matching header value from a list of header names.
pub(crate) fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// Parse `Retry-After: <seconds>`. The HTTP-date form is not used by the vendor.
pub(crate) fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let raw = header_first(headers, &["retry-after"])?;
    let secs: u64 = raw.parse().ok()?;
    Some(secs.saturating_mul(1000))
}
