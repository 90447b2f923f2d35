use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval_at, Instant};
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::error::GovernorError;
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, CACHE_SIZE, DEDUPLICATED, RATE_LIMITED, REQUEST_LATENCY,
    REQUEST_TOTAL,
};
use crate::pending::{PendingRegistry, Registration, SharedRequest};
use crate::rate_limit::{RateLimitConfig, RequestCounter};
use crate::task::BackgroundTask;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_MAX_AGE: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub cache_ttl: Duration,
}

impl RequestConfig {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.max_requests,
            window: self.window,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GovernorSettings {
    pub default_config: RequestConfig,
    pub sweep_interval: Duration,
    // sweeper ceiling, independent of any caller's TTL
    pub sweep_max_age: Duration,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            default_config: RequestConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_max_age: DEFAULT_SWEEP_MAX_AGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub counters_removed: usize,
    pub cache_entries_removed: usize,
}

pub type SweepHandle = BackgroundTask;

struct Inner<T, E> {
    cache: Cache<String, T>,
    counter: RequestCounter,
    pending: PendingRegistry<T, E>,
    settings: GovernorSettings,
}

// one per process, built by the composition root and shared by cloning
pub struct RequestGovernor<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for RequestGovernor<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> RequestGovernor<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    pub fn new(settings: GovernorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: Cache::new(),
                counter: RequestCounter::new(),
                pending: PendingRegistry::new(),
                settings,
            }),
        }
    }

    // execute_request with the default config
    pub async fn execute<F, Fut>(&self, key: &str, request_fn: F) -> Result<T, GovernorError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let config = self.inner.settings.default_config;
        self.execute_request(key, request_fn, &config).await
    }

    /// Runs `request_fn` for `key` unless a fresh cached value or an in-flight
    /// request for the same key can answer instead.
    ///
    /// Fails with [`GovernorError::RateLimitExceeded`] without calling
    /// `request_fn` when the key's window is spent. Otherwise `request_fn` is
    /// called on a spawned task, outside any registry lock, and runs to
    /// completion even if every caller goes away.
    pub async fn execute_request<F, Fut>(
        &self,
        key: &str,
        request_fn: F,
        config: &RequestConfig,
    ) -> Result<T, GovernorError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        REQUEST_TOTAL.inc();

        if let Some(data) = self.inner.cache.get(key, config.cache_ttl) {
            CACHE_HITS.inc();
            debug!(key, "cache hit");
            return Ok(data);
        }
        CACHE_MISSES.inc();

        let registration = self.inner.pending.join_or_register(key, |id| {
            if !self
                .inner
                .counter
                .can_make_request(key, &config.rate_limit())
            {
                RATE_LIMITED.inc();
                warn!(key, max_requests = config.max_requests, "rate limit exceeded");
                return Err(GovernorError::RateLimitExceeded {
                    key: key.to_string(),
                });
            }
            Ok(self.spawn_request(key.to_string(), id, request_fn))
        })?;

        let request = match registration {
            Registration::Joined(request) => {
                DEDUPLICATED.inc();
                debug!(key, "joined in-flight request");
                request
            }
            Registration::Started(request) => request,
        };
        request.await
    }

    fn spawn_request<F, Fut>(&self, key: String, id: u64, request_fn: F) -> SharedRequest<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let timer = REQUEST_LATENCY.start_timer();
            let result = request_fn().await;
            timer.observe_duration();

            match &result {
                Ok(data) => {
                    inner.cache.set(task_key.clone(), data.clone(), None);
                    CACHE_SIZE.set(inner.cache.len() as f64);
                }
                Err(e) => warn!(key = %task_key, error = %e, "request failed"),
            }
            inner.pending.complete(&task_key, id);
            result.map_err(GovernorError::Request)
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    inner.pending.complete(&key, id);
                    Err(GovernorError::Aborted(join_error.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn cached(&self, key: &str, ttl: Duration) -> Option<T> {
        self.inner.cache.get(key, ttl)
    }

    // requests still allowed for `key` in its current window
    pub fn remaining(&self, key: &str, config: &RequestConfig) -> u32 {
        self.inner.counter.remaining(key, &config.rate_limit())
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.pending.contains(key)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    // requests already running still complete and write their result
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        self.inner.pending.clear();
        CACHE_SIZE.set(0.0);
        info!("cache and pending requests cleared");
    }

    pub fn sweep(&self) -> SweepStats {
        let max_age = self.inner.settings.sweep_max_age;
        let stats = SweepStats {
            counters_removed: self.inner.counter.remove_older_than(max_age),
            cache_entries_removed: self.inner.cache.remove_older_than(max_age),
        };
        CACHE_SIZE.set(self.inner.cache.len() as f64);
        if stats != SweepStats::default() {
            debug!(
                counters = stats.counters_removed,
                cache_entries = stats.cache_entries_removed,
                "sweep removed stale entries"
            );
        }
        stats
    }

    // first sweep happens one interval after the call
    pub fn start_sweeper(&self) -> SweepHandle {
        let governor = self.clone();
        let every = self.inner.settings.sweep_interval;
        BackgroundTask::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Sweeper started (interval: {:?})", every);
            loop {
                ticker.tick().await;
                governor.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep};

    fn governor() -> RequestGovernor<u32, String> {
        RequestGovernor::new(GovernorSettings::default())
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> futures::future::Ready<Result<u32, String>> + Send + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(value))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_counter_and_request() {
        let governor = governor();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RequestConfig {
            max_requests: 1,
            ..RequestConfig::default()
        };

        assert_eq!(governor.execute_request("k", counting(&calls, 5), &config).await, Ok(5));
        // budget is spent, but the cached value still answers
        assert_eq!(governor.execute_request("k", counting(&calls, 6), &config).await, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!governor.is_pending("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_share_one_request() {
        let governor = governor();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>(42)
                }
            }
        };
        let first = governor.execute("volunteers", slow);
        let second = governor.execute("volunteers", counting(&calls, 0));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Ok(42));
        assert_eq!(b, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(governor.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_propagated_and_not_cached() {
        let governor = governor();
        let result = governor
            .execute("k", || async { Err::<u32, _>("upstream down".to_string()) })
            .await;
        assert_eq!(result, Err(GovernorError::Request("upstream down".to_string())));
        assert_eq!(governor.cache_len(), 0);
        assert!(!governor.is_pending("k"));

        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(governor.execute("k", counting(&calls, 1)).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_rejects_without_calling_request() {
        let governor = governor();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RequestConfig {
            max_requests: 2,
            window: Duration::from_secs(10),
            cache_ttl: Duration::ZERO,
        };

        for _ in 0..2 {
            governor.execute_request("k", counting(&calls, 1), &config).await.unwrap();
            advance(Duration::from_millis(1)).await;
        }
        let err = governor
            .execute_request("k", counting(&calls, 1), &config)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("k"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(governor.remaining("k", &config), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_lifts_once_window_elapses() {
        let governor = governor();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RequestConfig {
            max_requests: 1,
            window: Duration::from_secs(10),
            cache_ttl: Duration::ZERO,
        };

        assert_eq!(governor.execute_request("k", counting(&calls, 1), &config).await, Ok(1));
        advance(Duration::from_secs(10)).await;
        // still inside the window at exactly `window`
        let err = governor
            .execute_request("k", counting(&calls, 2), &config)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(Duration::from_millis(1)).await;
        assert_eq!(governor.execute_request("k", counting(&calls, 3), &config).await, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_value_expires_after_ttl() {
        let governor = governor();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RequestConfig {
            cache_ttl: Duration::from_millis(1_000),
            ..RequestConfig::default()
        };

        assert_eq!(governor.execute_request("k", counting(&calls, 1), &config).await, Ok(1));
        advance(Duration::from_millis(999)).await;
        assert_eq!(governor.execute_request("k", counting(&calls, 2), &config).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(Duration::from_millis(2)).await;
        assert_eq!(governor.execute_request("k", counting(&calls, 3), &config).await, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(governor.cached("k", config.cache_ttl), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn request_fn_may_inspect_governor() {
        let governor = governor();
        let governor_in_task = governor.clone();
        // runs while "k" is registered, so it must not hold the registry lock
        let result = governor
            .execute("k", move || {
                let pending = governor_in_task.is_pending("k");
                governor_in_task.clear_cache();
                futures::future::ready(Ok::<_, String>(u32::from(pending)))
            })
            .await;
        assert_eq!(result, Ok(1));
        assert_eq!(governor.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_runs_to_completion_when_caller_is_dropped() {
        let governor = governor();
        let fut = governor.execute("k", || async {
            sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(9)
        });
        // poll once so the request is registered and spawned, then drop it
        let _ = tokio::time::timeout(Duration::from_millis(1), fut).await;
        assert!(governor.is_pending("k"));

        sleep(Duration::from_millis(20)).await;
        assert!(!governor.is_pending("k"));
        assert_eq!(governor.cached("k", Duration::from_secs(1)), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cache_empties_cache_and_pending() {
        let governor = governor();
        governor.execute("done", || async { Ok::<_, String>(1) }).await.unwrap();
        let inflight = governor.execute("slow", || async {
            sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(2)
        });
        let _ = tokio::time::timeout(Duration::from_millis(1), inflight).await;
        assert_eq!(governor.pending_len(), 1);

        governor.clear_cache();
        assert_eq!(governor.cache_len(), 0);
        assert_eq!(governor.pending_len(), 0);
        assert_eq!(governor.cached("done", Duration::from_secs(300)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_entries_past_ceiling() {
        let governor = RequestGovernor::<u32, String>::new(GovernorSettings {
            sweep_max_age: Duration::from_secs(100),
            ..GovernorSettings::default()
        });
        governor.execute("old", || async { Ok::<_, String>(1) }).await.unwrap();
        advance(Duration::from_secs(60)).await;
        governor.execute("new", || async { Ok::<_, String>(2) }).await.unwrap();
        advance(Duration::from_secs(50)).await;

        let stats = governor.sweep();
        assert_eq!(
            stats,
            SweepStats {
                counters_removed: 1,
                cache_entries_removed: 1,
            }
        );
        assert_eq!(governor.cached("new", Duration::from_secs(300)), Some(2));
        assert_eq!(governor.cached("old", Duration::from_secs(300)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval_until_cancelled() {
        let governor = RequestGovernor::<u32, String>::new(GovernorSettings {
            sweep_interval: Duration::from_secs(10),
            sweep_max_age: Duration::from_secs(5),
            ..GovernorSettings::default()
        });
        let handle = governor.start_sweeper();
        governor.execute("k", || async { Ok::<_, String>(1) }).await.unwrap();

        sleep(Duration::from_secs(11)).await;
        assert_eq!(governor.cache_len(), 0);

        handle.cancel();
        governor.execute("k", || async { Ok::<_, String>(1) }).await.unwrap();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(governor.cache_len(), 1);
    }
}
