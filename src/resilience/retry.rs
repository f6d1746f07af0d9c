//! Named retry strategies for whole generation attempts.
//!
//! The vendor fails in three recognizable ways: its reCAPTCHA gate trips
//! (HTTP 403 mentioning recaptcha), its backend errors (500), or something
//! else goes wrong. Each gets its own delay schedule.

use crate::error_code::ErrorCategory;
use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry strategy selected from an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryStrategyKind {
    Recaptcha,
    ServerError,
    Default,
}

impl RetryStrategyKind {
    pub fn classify(message: &str) -> Self {
        if message.contains("403") && message.to_lowercase().contains("recaptcha") {
            Self::Recaptcha
        } else if message.contains("500") {
            Self::ServerError
        } else {
            Self::Default
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Recaptcha => "recaptcha",
            Self::ServerError => "server_error",
            Self::Default => "default",
        }
    }

    pub fn config(&self) -> RetryConfig {
        match self {
            Self::Recaptcha => RetryConfig {
                max_retries: 5,
                base_delay: Duration::from_secs(5),
                backoff_factor: 3.0,
                jitter: true,
                custom_delays: [5, 15, 30, 45, 60]
                    .into_iter()
                    .map(Duration::from_secs)
                    .collect(),
            },
            Self::ServerError => RetryConfig::exponential(3, Duration::from_secs(2), 2.0),
            Self::Default => RetryConfig::exponential(2, Duration::from_secs(1), 2.0),
        }
    }
}

/// Configuration for retry logic
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
    /// Explicit schedule; retry `n` uses entry `n - 1` when present.
    pub custom_delays: Vec<Duration>,
}

impl RetryConfig {
    pub fn exponential(max_retries: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
            jitter: true,
            custom_delays: Vec::new(),
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry `retry` (1-based), before jitter.
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let n = retry.max(1);
        if let Some(d) = self.custom_delays.get(n as usize - 1) {
            return *d;
        }
        self.base_delay
            .mul_f64(self.backoff_factor.powi(n as i32 - 1))
    }

    /// Delay before retry `retry` with jitter (x0.8..=x1.2) applied when enabled.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.calculate_delay(retry);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.8..=1.2))
        } else {
            delay
        }
    }
}

/// Run `op` until it succeeds or the strategy's retries are exhausted.
///
/// `on_retry(retry, delay, message)` is called before each sleep. Errors that
/// are permanent and not reCAPTCHA rejections return immediately. The last
/// error is returned when retries run out.
pub async fn retry_with_backoff<T, F, Fut, R>(
    mut op: F,
    strategy: RetryStrategyKind,
    on_retry: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, Duration, &str),
{
    match op().await {
        Ok(v) => Ok(v),
        Err(first) => retry_with_backoff_after(first, op, strategy, on_retry).await,
    }
}

/// Like [`retry_with_backoff`] for an operation that already failed once
/// with `first`. The first re-attempt waits the strategy's retry-1 delay.
pub async fn retry_with_backoff_after<T, F, Fut, R>(
    first: Error,
    mut op: F,
    strategy: RetryStrategyKind,
    mut on_retry: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, Duration, &str),
{
    let config = strategy.config();
    let mut err = first;
    let mut retry = 0u32;
    loop {
        let message = err.to_string();
        let detected = RetryStrategyKind::classify(&message);
        if detected != RetryStrategyKind::Recaptcha && err.category() == ErrorCategory::Permanent
        {
            return Err(err);
        }
        retry += 1;
        if retry > config.max_retries {
            return Err(err);
        }
        let delay = config.delay_for(retry);
        on_retry(retry, delay, &message);
        warn!(
            retry,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            strategy = detected.name(),
            error = %truncate(&message, 100),
            "retrying"
        );
        tokio::time::sleep(delay).await;
        err = match op().await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
