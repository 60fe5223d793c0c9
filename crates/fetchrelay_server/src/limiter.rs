/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FetchRelay Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

/// Per-client fixed-window rate limiter. A budget of 0 disables the check.
pub struct RateLimiter {
    inner: Mutex<HashMap<String, WindowCounter>>,
}

#[derive(Clone, Copy)]
struct WindowCounter {
    window_start_ms: i64,
    count: u32,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, ip: String, bucket: &str, per_minute: u32) -> bool {
        if per_minute == 0 {
            return true;
        }
        let key = format!("{bucket}:{ip}");
        let mut map = self.inner.lock().await;
        let now = now_ms();

        // Opportunistic cleanup to bound memory: prune entries inactive for >2 minutes.
        if map.len() > 10_000 {
            let cutoff = now - 120_000;
            map.retain(|_, v| v.window_start_ms >= cutoff);
        }

        let win = map.entry(key).or_insert(WindowCounter {
            window_start_ms: now,
            count: 0,
        });
        if now - win.window_start_ms > 60_000 {
            win.window_start_ms = now;
            win.count = 0;
        }
        if win.count >= per_minute {
            return false;
        }
        win.count += 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_budget_disables_limiting() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check("1.2.3.4".to_string(), "forward", 0).await);
        }
    }

    #[tokio::test]
    async fn budget_is_enforced_within_a_window() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("1.2.3.4".to_string(), "forward", 2).await);
        assert!(limiter.check("1.2.3.4".to_string(), "forward", 2).await);
        assert!(!limiter.check("1.2.3.4".to_string(), "forward", 2).await);
    }

    #[tokio::test]
    async fn clients_and_buckets_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("1.2.3.4".to_string(), "forward", 1).await);
        assert!(!limiter.check("1.2.3.4".to_string(), "forward", 1).await);
        assert!(limiter.check("5.6.7.8".to_string(), "forward", 1).await);
        assert!(limiter.check("1.2.3.4".to_string(), "chat", 1).await);
    }
}
