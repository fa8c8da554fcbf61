//! Events-provider throttling.
//!
//! [`RateLimiter::wait`] spaces requests by a minimum interval; [`RetryPolicy`] decides
//! whether a throttled (HTTP 429) request is retried and how long to back off:
//! 2s, 4s, 8s, then give up. Only events-provider calls go through here, never chain RPC.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::utils::clock::Clock;
use crate::utils::constants::{DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_INTERVAL_MS};

/// HTTP status signalling throttling
pub const THROTTLED_STATUS: u16 = 429;

/// Bounded exponential backoff on throttling responses
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_count: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_count: 0,
        }
    }

    /// Backoff for this status, or `None` when the caller must surface a failure.
    ///
    /// Non-throttling statuses reset the counter. Giving up also resets it so the
    /// next request starts with a fresh budget.
    pub fn handle_retry(&mut self, status: u16) -> Option<Duration> {
        if status != THROTTLED_STATUS {
            self.retry_count = 0;
            return None;
        }
        if self.retry_count >= self.max_retries {
            self.retry_count = 0;
            return None;
        }
        self.retry_count += 1;
        Some(Duration::from_secs(1u64 << self.retry_count))
    }

    pub fn reset(&mut self) {
        self.retry_count = 0;
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

struct LimiterState {
    last_request: Option<Instant>,
    policy: RetryPolicy,
}

/// Shared throttle for all requests to one provider
pub struct RateLimiter {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_retries: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            clock,
            state: Mutex::new(LimiterState {
                last_request: None,
                policy: RetryPolicy::new(max_retries),
            }),
        }
    }

    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_REQUEST_INTERVAL_MS),
            DEFAULT_MAX_RETRIES,
            clock,
        )
    }

    /// Block until the minimum interval since the previous request has elapsed
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_request {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!("⏳ Rate limiting: waiting {}ms", remaining.as_millis());
                self.clock.sleep(remaining).await;
            }
        }
        state.last_request = Some(self.clock.now());
    }

    /// Feed a response status to the retry policy.
    ///
    /// Sleeps through the backoff and returns `true` when the request should be
    /// retried; returns `false` on success or once the retry cap is exhausted.
    pub async fn backoff(&self, status: u16) -> bool {
        let decision = {
            let mut state = self.state.lock().await;
            let attempt = state.policy.retry_count() + 1;
            let max = state.policy.max_retries();
            state.policy.handle_retry(status).map(|d| (d, attempt, max))
        };

        match decision {
            Some((delay, attempt, max)) => {
                warn!(
                    "⏳ Rate limited (HTTP 429), backing off {}s (attempt {}/{})",
                    delay.as_secs(),
                    attempt,
                    max
                );
                self.clock.sleep(delay).await;
                true
            }
            None => {
                if status == THROTTLED_STATUS {
                    warn!("🛑 Rate limit retries exhausted");
                }
                false
            }
        }
    }

    /// Reset the retry counter after a request that did not reach the provider
    pub async fn reset(&self) {
        self.state.lock().await.policy.reset();
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
