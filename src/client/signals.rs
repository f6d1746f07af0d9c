use crate::resilience::rate_limiter::RateLimiterSnapshot;

/// A snapshot of runtime "signals" for orchestration.
///
/// Facts only, no policy. The batch engine and the CLI read these to explain
/// why a call waited.
#[derive(Debug, Clone, Default)]
pub struct SignalsSnapshot {
    pub inflight: Option<InflightSnapshot>,
    pub rate_limiter: Option<RateLimiterSnapshot>,
}

#[derive(Debug, Clone)]
pub struct InflightSnapshot {
    pub max: usize,
    pub available: usize,
    pub in_use: usize,
}
