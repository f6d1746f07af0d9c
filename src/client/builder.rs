use crate::client::core::VeoClient;
use crate::client::policy::PolicyEngine;
use crate::config::{Settings, DEFAULT_BASE_URL};
use crate::pipeline::{Pipeline, DEFAULT_IDLE_TIMEOUT};
use crate::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::transport::{HttpTransport, TransportConfig};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Builder for creating clients with custom configuration.
///
/// Keep this surface area small and predictable.
pub struct VeoClientBuilder {
    api_key: Option<String>,
    base_url: String,
    max_retries: u32,
    retry_base_delay: Duration,
    idle_timeout: Duration,
    max_inflight: Option<usize>,
    rate_limiter: Option<Arc<RateLimiter>>,
    max_upload_bytes: u64,
    transport: TransportConfig,
}

impl VeoClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_inflight: None,
            rate_limiter: None,
            max_upload_bytes: 50 * 1024 * 1024,
            transport: TransportConfig::default(),
        }
    }

    /// Seed a builder from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut builder = Self::new()
            .base_url(settings.base_url.clone())
            .max_retries(settings.max_retries)
            .idle_timeout(settings.stream_idle_timeout())
            .request_timeout(settings.http_read_timeout())
            .requests_per_minute(settings.requests_per_minute)
            .max_inflight(settings.max_concurrent_jobs)
            .max_upload_bytes(settings.max_upload_bytes());
        builder.api_key = settings.api_key.clone();
        builder.transport.proxy_url = settings.proxy_url.clone();
        builder
    }

    /// Use this key instead of resolving one from the keyring or environment.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API base URL (mock servers, staging).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Total attempts for non-streaming calls, the first included.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Base of the exponential backoff for 5xx and transport failures.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Longest silence tolerated on an open event stream.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bound on a whole non-streaming request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.request_timeout = timeout;
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.transport.proxy_url = Some(url.into());
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Client-side request rate. 0 disables the limiter.
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.rate_limiter = if rpm == 0 {
            None
        } else {
            Some(Arc::new(RateLimiter::new(RateLimiterConfig::from_rpm(rpm))))
        };
        self
    }

    /// Share one limiter between several clients.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Limit maximum number of in-flight requests and open streams.
    pub fn max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = Some(n.max(1));
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.max_upload_bytes = n;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<VeoClient> {
        if self.max_retries == 0 {
            return Err(Error::configuration_with_context(
                "at least one attempt is required",
                ErrorContext::new().with_field_path("client.max_retries"),
            ));
        }
        let api_key = match self.api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => Settings::default().resolve_api_key()?,
        };

        let transport = Arc::new(HttpTransport::new(
            &self.base_url,
            &api_key,
            &self.transport,
        )?);
        let pipeline = Pipeline::new(self.idle_timeout)?;
        let inflight = self.max_inflight.map(|n| Arc::new(Semaphore::new(n)));

        Ok(VeoClient {
            transport,
            pipeline,
            policy: PolicyEngine::new(self.max_retries, self.retry_base_delay),
            inflight,
            max_inflight: self.max_inflight,
            rate_limiter: self.rate_limiter,
            max_upload_bytes: self.max_upload_bytes,
        })
    }
}

impl Default for VeoClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
