use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

// Rate limit entry - tracks requests per key
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Default)]
pub struct RequestCounter {
    entries: DashMap<String, RateLimitEntry>,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request against `key` and reports whether it may proceed.
    ///
    /// The first request for a key always opens a window. A window expires
    /// only once strictly more than `config.window` has passed since it
    /// opened; a request landing exactly on the boundary still belongs to it.
    pub fn can_make_request(&self, key: &str, config: &RateLimitConfig) -> bool {
        let now = Instant::now();

        let mut entry = match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry {
                    count: 1,
                    window_start: now,
                });
                return true;
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };

        // window expired..? Reset it
        if now.duration_since(entry.window_start) > config.window {
            entry.count = 1;
            entry.window_start = now;
            return true;
        }

        // under limit..? Allow
        if entry.count < config.max_requests {
            entry.count += 1;
            return true;
        }

        false
    }

    pub fn remaining(&self, key: &str, config: &RateLimitConfig) -> u32 {
        match self.entries.get(key) {
            Some(entry) if entry.window_start.elapsed() <= config.window => {
                config.max_requests.saturating_sub(entry.count)
            }
            _ => config.max_requests,
        }
    }

    pub fn remove_older_than(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.window_start.elapsed() <= max_age);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn config(max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window: Duration::from_millis(1_000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_max_then_rejects() {
        let counter = RequestCounter::new();
        let cfg = config(3);

        assert!(counter.can_make_request("shifts", &cfg));
        assert!(counter.can_make_request("shifts", &cfg));
        assert!(counter.can_make_request("shifts", &cfg));
        assert!(!counter.can_make_request("shifts", &cfg));
        assert!(!counter.can_make_request("shifts", &cfg));
        assert_eq!(counter.remaining("shifts", &cfg), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_counted_separately() {
        let counter = RequestCounter::new();
        let cfg = config(1);

        assert!(counter.can_make_request("a", &cfg));
        assert!(!counter.can_make_request("a", &cfg));
        assert!(counter.can_make_request("b", &cfg));
        assert_eq!(counter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_call_stays_in_old_window() {
        let counter = RequestCounter::new();
        let cfg = config(2);

        assert!(counter.can_make_request("k", &cfg));
        assert!(counter.can_make_request("k", &cfg));

        advance(cfg.window).await;
        assert!(!counter.can_make_request("k", &cfg));

        advance(Duration::from_millis(1)).await;
        assert!(counter.can_make_request("k", &cfg));
        // the resetting call counts as the first of the new window
        assert_eq!(counter.remaining("k", &cfg), 1);
        assert!(counter.can_make_request("k", &cfg));
        assert!(!counter.can_make_request("k", &cfg));
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_succeeds_even_with_zero_budget() {
        let counter = RequestCounter::new();
        let cfg = config(0);
        assert!(counter.can_make_request("k", &cfg));
        assert!(!counter.can_make_request("k", &cfg));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_older_than_drops_idle_counters() {
        let counter = RequestCounter::new();
        let cfg = config(5);
        counter.can_make_request("idle", &cfg);
        advance(Duration::from_secs(30)).await;
        counter.can_make_request("busy", &cfg);

        assert_eq!(counter.remove_older_than(Duration::from_secs(10)), 1);
        assert_eq!(counter.len(), 1);
        assert_eq!(counter.remaining("busy", &cfg), 4);
    }
}
