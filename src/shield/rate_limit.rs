use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Sliding-window request counter keyed by an arbitrary string.
///
/// When a request comes in:
/// 1. Remove timestamps older than the window
/// 2. If the key already holds `limit` timestamps, reject
/// 3. Otherwise record the request and allow it
///
/// Rejected requests are not recorded, so a client that keeps hammering
/// does not extend its own lockout.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    window_duration: Duration,
}

/// The key is over its limit for the current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitExceeded {
    pub limit: usize,
    /// Seconds until the oldest counted request leaves the window
    pub retry_after: u64,
}

impl RateLimiter {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(HashMap::new())),
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Count a request against `key`, allowing at most `limit` per window
    pub async fn check(&self, key: &str, limit: usize) -> Result<(), LimitExceeded> {
        self.check_at(key, limit, Instant::now()).await
    }

    async fn check_at(&self, key: &str, limit: usize, now: Instant) -> Result<(), LimitExceeded> {
        let mut state = self.state.write().await;
        let requests = state.entry(key.to_string()).or_default();

        requests.retain(|&timestamp| now.duration_since(timestamp) < self.window_duration);

        if requests.len() >= limit {
            return Err(LimitExceeded {
                limit,
                retry_after: self.retry_after(requests, now),
            });
        }

        requests.push(now);
        Ok(())
    }

    fn retry_after(&self, requests: &[Instant], now: Instant) -> u64 {
        match requests.first() {
            Some(&oldest) => {
                let remaining = self
                    .window_duration
                    .saturating_sub(now.duration_since(oldest));
                // Round up so clients never retry a moment too early
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                secs.max(1)
            }
            None => 1,
        }
    }

    /// Drop keys with no requests inside the current window
    pub async fn cleanup_expired(&self) {
        self.cleanup_at(Instant::now()).await
    }

    async fn cleanup_at(&self, now: Instant) {
        let mut state = self.state.write().await;
        state.retain(|_, requests| {
            requests.retain(|&timestamp| now.duration_since(timestamp) < self.window_duration);
            !requests.is_empty()
        });
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.state.read().await.len()
    }
}
