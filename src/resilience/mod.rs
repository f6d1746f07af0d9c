//! Resilience primitives: request pacing and retry schedules.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Sliding one-minute window limiter |
//! | [`retry`] | Named retry strategies (`recaptcha`, `server_error`, `default`) |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use genaipro_veo::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn demo() -> genaipro_veo::Result<()> {
//! let limiter = RateLimiter::new(RateLimiterConfig::from_rpm(20));
//! limiter.acquire().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry
//!
//! ```rust
//! use genaipro_veo::resilience::retry::RetryStrategyKind;
//!
//! let kind = RetryStrategyKind::classify("HTTP 403: recaptcha verification failed");
//! assert_eq!(kind, RetryStrategyKind::Recaptcha);
//! assert_eq!(kind.config().max_retries, 5);
//! ```

pub mod rate_limiter;
pub mod retry;
