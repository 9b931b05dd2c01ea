//! Per-account throttling of credential and code checks
//!
//! Keys are built from the action and the normalized email, for example
//! `login:buyer@example.com`, so a burst against one account does not lock
//! out anybody else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lockout duration in seconds
    pub lockout_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,  // 5 minutes
            lockout_seconds: 900, // 15 minutes
        }
    }
}

#[derive(Debug)]
struct Attempts {
    count: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// In-memory rate limiter shared by the handlers of one service
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Attempts>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;

        let entry = entries.entry(key.to_string()).or_insert(Attempts {
            count: 0,
            window_start: now,
            locked_until: None,
        });

        if let Some(locked_until) = entry.locked_until {
            if now < locked_until {
                return false;
            }
            entry.count = 0;
            entry.locked_until = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_attempts {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            warn!(
                "Locked {} for {} seconds after {} attempts",
                key, self.config.lockout_seconds, entry.count
            );
            return false;
        }

        entry.count += 1;
        true
    }

    /// Forget the attempts recorded for `key` after a successful check
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Drop entries that are neither locked nor inside an active window
    pub async fn prune(&self) {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);
        self.entries.lock().await.retain(|_, entry| {
            entry.locked_until.is_some_and(|until| now < until)
                || now.duration_since(entry.window_start) < window
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig::default())
    }

    #[tokio::test]
    async fn test_sixth_attempt_in_window_is_refused() {
        let limiter = limiter();
        for _ in 0..5 {
            assert!(limiter.check("login:buyer@example.com").await);
        }
        assert!(!limiter.check("login:buyer@example.com").await);
        assert!(limiter.check("login:other@example.com").await);
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.check_at("login:a@b.co", start).await;
        }

        assert!(
            !limiter
                .check_at("login:a@b.co", start + Duration::from_secs(600))
                .await
        );
        assert!(
            limiter
                .check_at("login:a@b.co", start + Duration::from_secs(901))
                .await
        );
    }

    #[tokio::test]
    async fn test_window_rolls_over() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at("verify:a@b.co", start).await);
        }
        assert!(
            limiter
                .check_at("verify:a@b.co", start + Duration::from_secs(301))
                .await
        );
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("login:a@b.co").await;
        }
        limiter.reset("login:a@b.co").await;
        assert!(limiter.check("login:a@b.co").await);
    }
}
