use crate::Result;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub requests_per_minute: u32,
    /// Acquisitions recorded in the last 60 s.
    pub in_window: usize,
    /// Estimated wait time until a slot frees up (ms), if currently full.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Permits per sliding minute. Zero disables limiting.
    pub requests_per_minute: u32,
}

impl RateLimiterConfig {
    pub fn from_rpm(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }
}

#[derive(Debug)]
struct State {
    requests: VecDeque<Instant>,
    /// Set when the vendor asked us to back off (HTTP 429 `Retry-After`).
    blocked_until: Option<Instant>,
}

impl State {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.requests.front() {
            if now.duration_since(*front) >= WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn wait_for(&self, now: Instant, rpm: u32) -> Option<Duration> {
        let mut wait = self
            .blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now);
        if rpm > 0 && self.requests.len() >= rpm as usize {
            if let Some(oldest) = self.requests.front() {
                let local = (*oldest + WINDOW).saturating_duration_since(now);
                wait = Some(wait.map_or(local, |w| w.max(local)));
            }
        }
        wait.filter(|w| !w.is_zero())
    }
}

/// Sliding one-minute window limiter.
///
/// `acquire` waits until fewer than `requests_per_minute` permits were handed
/// out during the last 60 seconds, then records one.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                requests: VecDeque::new(),
                blocked_until: None,
            }),
        }
    }

    /// Acquire one permit (may sleep).
    pub async fn acquire(&self) -> Result<()> {
        loop {
            let wait = {
                let mut st = self.state.lock().await;
                let now = Instant::now();
                st.prune(now);
                match st.wait_for(now, self.cfg.requests_per_minute) {
                    None => {
                        st.blocked_until = None;
                        st.requests.push_back(now);
                        return Ok(());
                    }
                    Some(w) => w,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Try to acquire a permit without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        st.prune(now);
        if st.wait_for(now, self.cfg.requests_per_minute).is_some() {
            return false;
        }
        st.requests.push_back(now);
        true
    }

    /// Stop handing out permits for `duration`.
    pub async fn block_for(&self, duration: Duration) {
        let mut st = self.state.lock().await;
        let until = Instant::now() + duration;
        st.blocked_until = Some(st.blocked_until.map_or(until, |cur| cur.max(until)));
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        st.prune(now);
        RateLimiterSnapshot {
            requests_per_minute: self.cfg.requests_per_minute,
            in_window: st.requests.len(),
            estimated_wait_ms: st
                .wait_for(now, self.cfg.requests_per_minute)
                .map(|w| w.as_millis() as u64),
        }
    }
}
