//! Per-caller throttling of the call webhook.
//!
//! Provider webhooks arrive from a shared pool of egress addresses, so
//! windows are keyed on the caller rather than the peer address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Tracked callers above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    hits: u32,
}

impl Window {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.opened) > WINDOW
    }
}

/// Fixed-window request counter keyed by caller.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            tracing::error!("rate limiter lock poisoned, continuing with existing counts");
            poisoned.into_inner()
        })
    }

    /// Counts one request from `caller`; `false` once it exceeds `limit` in
    /// the current window.
    pub fn check(&self, caller: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut windows = self.windows();

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, window| !window.is_expired(now));
        }

        let window = windows.entry(caller.to_string()).or_insert(Window {
            opened: now,
            hits: 0,
        });
        if window.is_expired(now) {
            *window = Window {
                opened: now,
                hits: 0,
            };
        }
        window.hits = window.hits.saturating_add(1);
        window.hits <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_refuses() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("+15551234567", 5));
        }
        assert!(!limiter.check("+15551234567", 5));
    }

    #[test]
    fn callers_are_counted_separately() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("+15551234567", 1));
        assert!(!limiter.check("+15551234567", 1));
        assert!(limiter.check("+15559876543", 1));
    }

    #[test]
    fn zero_limit_refuses_everything() {
        let limiter = RateLimiter::new();
        assert!(!limiter.check("CA1", 0));
    }

    #[test]
    fn pruning_keeps_live_windows() {
        let limiter = RateLimiter::new();
        for n in 0..=PRUNE_THRESHOLD {
            limiter.check(&format!("+1555{:07}", n), 100);
        }

        let last = format!("+1555{:07}", PRUNE_THRESHOLD);
        for _ in 0..98 {
            assert!(limiter.check(&last, 100));
        }
        assert!(!limiter.check(&last, 100));
    }
}
