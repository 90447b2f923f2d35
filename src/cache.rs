use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

// Cache entry with timestamp
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp: Instant,
    pub etag: Option<String>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() <= ttl
    }
}

// freshness is judged at read time against the caller's TTL, only
// remove_older_than expires anything in the background
pub struct Cache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    // stale entries are deleted on the way out
    pub fn get<Q>(&self, key: &Q, ttl: Duration) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stale = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => return Some(entry.data.clone()),
            Some(_) => true,
            None => false,
        };
        if stale {
            // re-check under the write lock, a fresh set may have raced in
            self.entries.remove_if(key, |_, entry| !entry.is_fresh(ttl));
        }
        None
    }

    pub fn set(&self, key: K, data: V, etag: Option<String>) {
        self.entries.insert(
            key,
            CacheEntry {
                data,
                timestamp: Instant::now(),
                etag,
            },
        );
    }

    // drops every entry older than `max_age`, whatever TTL its readers use
    pub fn remove_older_than(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(max_age));
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

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// Create a cache key (hash of method + path and query)
pub fn make_cache_key(method: &str, path_and_query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b" ");
    hasher.update(path_and_query.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_millis(1_000);

    #[tokio::test(start_paused = true)]
    async fn hit_just_before_ttl_and_miss_just_after() {
        let cache: Cache<String, u32> = Cache::new();
        cache.set("roster".to_string(), 7, None);

        advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get("roster", TTL), Some(7));

        advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get("roster", TTL), None);
        assert!(cache.is_empty(), "stale entry is deleted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn entry_exactly_at_ttl_is_still_fresh() {
        let cache: Cache<&str, u32> = Cache::new();
        cache.set("k", 1, None);
        advance(TTL).await;
        assert_eq!(cache.get("k", TTL), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_restamps() {
        let cache: Cache<&str, &str> = Cache::new();
        cache.set("k", "old", Some("\"v1\"".to_string()));
        advance(Duration::from_millis(900)).await;
        cache.set("k", "new", None);
        advance(Duration::from_millis(900)).await;

        assert_eq!(cache.get("k", TTL), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_older_than_keeps_recent_entries() {
        let cache: Cache<&str, u32> = Cache::new();
        cache.set("old", 1, None);
        advance(Duration::from_secs(10)).await;
        cache.set("new", 2, None);
        advance(Duration::from_secs(1)).await;

        assert_eq!(cache.remove_older_than(Duration::from_secs(5)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new", Duration::from_secs(5)), Some(2));
    }

    #[test]
    fn cache_key_depends_on_method_and_path() {
        let a = make_cache_key("GET", "/api/v1/volunteer/shifts?week=3");
        let b = make_cache_key("GET", "/api/v1/volunteer/shifts?week=4");
        let c = make_cache_key("POST", "/api/v1/volunteer/shifts?week=3");
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, make_cache_key("GET", "/api/v1/volunteer/shifts?week=3"));
    }
}
