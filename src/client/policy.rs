use crate::{Error, ErrorContext};
use std::time::Duration;

/// Delay used when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Internal decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Retry policy for non-streaming calls.
///
/// - 429: wait `Retry-After` seconds (default 60).
/// - 5xx and transport failures: wait `base_delay * 2^attempt`.
/// - everything else fails at once.
///
/// `max_attempts` counts every attempt, the first included.
#[derive(Debug, Clone)]
pub(crate) struct PolicyEngine {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl PolicyEngine {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide what to do next after an attempt failed.
    ///
    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if attempt + 1 >= self.max_attempts {
            return Decision::Fail;
        }
        match err {
            Error::Remote {
                status: 429,
                retry_after_ms,
                ..
            } => Decision::Retry {
                delay: retry_after_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_RETRY_AFTER),
            },
            Error::Remote { status, .. } if *status >= 500 => Decision::Retry {
                delay: self.backoff_delay(attempt),
            },
            Error::Transport(_) => Decision::Retry {
                delay: self.backoff_delay(attempt),
            },
            _ => Decision::Fail,
        }
    }

    /// The error surfaced to the caller once no further attempt will be made.
    pub fn exhausted(&self, err: Error, request_id: &str) -> Error {
        let ctx = ErrorContext::new()
            .with_request_id(request_id)
            .with_source("request");
        match err {
            Error::Remote {
                status: 429,
                ..
            } => Error::network_with_context(
                format!("Max retries ({}) exceeded", self.max_attempts),
                ctx.with_status_code(429),
            ),
            Error::Remote {
                status, message, ..
            } => Error::network_with_context(
                format!("HTTP {}: {}", status, message),
                ctx.with_status_code(status),
            ),
            Error::Transport(e) => {
                Error::network_with_context(format!("Failed to connect to VEO API: {}", e), ctx)
            }
            other => other,
        }
    }
}
