use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::seconds(60),
        }
    }
}

#[derive(Debug)]
struct FixedWindow {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Per-user fixed-window counter. The first request after the window
/// elapses resets the count rather than sliding it.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<Uuid, FixedWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn check_rate_limit(&self, user_id: Uuid) -> bool {
        let mut windows = self.windows.write().await;
        let now = Utc::now();

        // Get or create window for user
        let window = windows.entry(user_id).or_insert_with(|| FixedWindow {
            window_start: now,
            count: 0,
        });

        // Expired window starts over
        if now - window.window_start >= self.config.window {
            window.window_start = now;
            window.count = 0;
        }

        if window.count < self.config.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        let cutoff = Utc::now() - self.config.window;

        // Remove windows that have already elapsed
        windows.retain(|_, window| window.window_start > cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as TokioDuration};

    #[tokio::test]
    async fn test_fixed_window_limit() {
        let config = RateLimitConfig {
            max_requests: 10,
            window: Duration::seconds(1),
        };
        let limiter = RateLimiter::new(config);
        let user_id = Uuid::new_v4();

        // Should allow requests up to limit
        for _ in 0..10 {
            assert!(limiter.check_rate_limit(user_id).await);
        }

        // Should deny requests over limit
        assert!(!limiter.check_rate_limit(user_id).await);

        // Another user has an independent window
        assert!(limiter.check_rate_limit(Uuid::new_v4()).await);

        // Wait for window to pass
        sleep(TokioDuration::from_millis(1100)).await;

        // Fresh window allows the full budget again
        for _ in 0..10 {
            assert!(limiter.check_rate_limit(user_id).await);
        }
        assert!(!limiter.check_rate_limit(user_id).await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_elapsed_windows() {
        let config = RateLimitConfig {
            max_requests: 10,
            window: Duration::milliseconds(100),
        };
        let limiter = RateLimiter::new(config);

        limiter.check_rate_limit(Uuid::new_v4()).await;
        limiter.check_rate_limit(Uuid::new_v4()).await;
        assert_eq!(limiter.windows.read().await.len(), 2);

        sleep(TokioDuration::from_millis(150)).await;
        limiter.cleanup().await;
        assert!(limiter.windows.read().await.is_empty());
    }
}
