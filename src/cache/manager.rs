//! In-memory request cache with expiry and per-key single-flight
//!
//! Provides a `RequestCache` that maps canonical request keys to fetched values.
//! Each key owns a slot that is filled at most once per fetch; concurrent callers
//! for the same key wait on the slot instead of starting a second fetch.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// A value stored in the cache along with its freshness window
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// When the value was cached
    pub cached_at: DateTime<Utc>,
    /// When the value stops being served
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Whether this entry has outlived its TTL
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

/// Deduplicating cache for outbound requests
///
/// Entries older than the configured TTL are treated as absent and replaced on
/// the next lookup. A fetch that fails leaves no live entry for its key, so the
/// following caller fetches again.
///
/// Every miss also sweeps the map: expired entries are dropped, along with empty
/// slots that no caller holds any more (left behind when concurrent fetches for
/// one key all fail).
///
/// The cache is an ordinary value: construct one per client and share it by
/// reference or `Arc`.
#[derive(Debug)]
pub struct RequestCache<V = serde_json::Value> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    ttl: Duration,
}

impl<V: Clone> RequestCache<V> {
    /// Creates an empty cache whose entries live for `ttl`
    pub fn new(ttl: std::time::Duration) -> Self {
        // Out-of-range TTLs saturate to roughly a century
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::weeks(52 * 100));
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value cached under `key`, running `fetch` to produce it on a miss
    ///
    /// # Arguments
    /// * `key` - Canonical key for the request
    /// * `fetch` - Produces the value when no live entry exists
    ///
    /// # Returns
    /// * `Ok(V)` - The cached or freshly fetched value
    /// * `Err(E)` - The error from `fetch`; the cache is left without an entry for `key`
    ///
    /// # Behavior
    /// - A live entry is returned without calling `fetch`
    /// - If another caller is already fetching `key`, this call waits for that result
    /// - If the in-flight fetch fails, a waiting caller runs its own `fetch`
    pub async fn get_or_fetch<E, F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot_for(key);
        let ttl = self.ttl;

        let result = slot
            .get_or_try_init(|| async move {
                fetch().await.map(|value| {
                    let cached_at = Utc::now();
                    CacheEntry {
                        value,
                        cached_at,
                        expires_at: cached_at + ttl,
                    }
                })
            })
            .await;

        match result {
            Ok(entry) => Ok(entry.value.clone()),
            Err(err) => {
                self.discard_unfilled(key, &slot);
                Err(err)
            }
        }
    }

    /// Finds the slot for `key`, replacing it when its entry has expired
    fn slot_for(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots();

        if let Some(slot) = slots.get(key) {
            match slot.get() {
                Some(entry) if !entry.is_expired() => {
                    debug!(key, "cache hit");
                    return Arc::clone(slot);
                }
                Some(_) => debug!(key, "cache entry expired"),
                None => {
                    debug!(key, "joining in-flight request");
                    return Arc::clone(slot);
                }
            }
        } else {
            debug!(key, "cache miss");
        }

        Self::sweep(&mut slots);

        let slot: Slot<V> = Arc::new(OnceCell::new());
        slots.insert(key.to_string(), Arc::clone(&slot));
        slot
    }

    /// Drops expired entries and abandoned empty slots, returning how many went
    ///
    /// Callers only clone slot handles under the lock, so an empty slot held by
    /// the map alone has no fetch in flight.
    fn sweep(slots: &mut HashMap<String, Slot<V>>) -> usize {
        let before = slots.len();
        slots.retain(|_, slot| match slot.get() {
            Some(entry) => !entry.is_expired(),
            None => Arc::strong_count(slot) > 1,
        });
        let swept = before - slots.len();
        if swept > 0 {
            debug!(swept, "swept stale cache slots");
        }
        swept
    }

    /// Drops an empty slot after a failed fetch unless other callers still wait on it
    fn discard_unfilled(&self, key: &str, slot: &Slot<V>) {
        let mut slots = self.slots();
        let Some(current) = slots.get(key) else {
            return;
        };
        // New handles are only cloned under the lock: the map's plus ours means no waiters
        if Arc::ptr_eq(current, slot) && current.get().is_none() && Arc::strong_count(slot) == 2
        {
            trace!(key, "discarding slot after failed fetch");
            slots.remove(key);
        }
    }

    /// Returns the live entry for `key`, if one exists
    pub fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.get())
            .filter(|entry| !entry.is_expired())
            .cloned()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.get().is_some_and(|entry| !entry.is_expired()))
            .count()
    }

    /// Whether the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry and abandoned slot, returning how many were dropped
    ///
    /// The same sweep runs on every cache miss; this forces one without a lookup.
    pub fn purge_expired(&self) -> usize {
        Self::sweep(&mut self.slots())
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.slots().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn create_test_cache() -> RequestCache<String> {
        RequestCache::new(StdDuration::from_secs(300))
    }

    async fn counted_fetch(calls: &AtomicUsize, value: &str) -> Result<String, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value.to_string())
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch("anime?q=naruto", || counted_fetch(&calls, "first"))
            .await
            .expect("First fetch should succeed");
        let second = cache
            .get_or_fetch("anime?q=naruto", || counted_fetch(&calls, "second"))
            .await
            .expect("Second lookup should succeed");

        assert_eq!(first, "first");
        assert_eq!(second, "first", "Second lookup should return cached value");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Only one fetch should run");
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("anime/1", || counted_fetch(&calls, "one"))
            .await
            .unwrap();
        let other = cache
            .get_or_fetch("anime/2", || counted_fetch(&calls, "two"))
            .await
            .unwrap();

        assert_eq!(other, "two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let cache: RequestCache<String> = RequestCache::new(StdDuration::from_millis(20));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("top/anime", || counted_fetch(&calls, "stale"))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(cache.peek("top/anime").is_none(), "Expired entry should be absent");

        let refreshed = cache
            .get_or_fetch("top/anime", || counted_fetch(&calls, "fresh"))
            .await
            .unwrap();

        assert_eq!(refreshed, "fresh", "Stale entry should be overwritten");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_entry() {
        let cache = create_test_cache();

        let result = cache
            .get_or_fetch("anime/404", || async { Err::<String, _>("boom".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.peek("anime/404").is_none());
        assert!(cache.is_empty());
        assert!(cache.slots().is_empty(), "Failed slot should be discarded");

        let calls = AtomicUsize::new(0);
        let value = cache
            .get_or_fetch("anime/404", || counted_fetch(&calls, "recovered"))
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Failure should not be cached");
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        let calls = &calls;
        let slow_fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(50)).await;
            Ok::<_, String>("shared".to_string())
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("anime?q=one+piece", slow_fetch),
            cache.get_or_fetch("anime?q=one+piece", slow_fetch),
        );

        assert_eq!(a.unwrap(), "shared");
        assert_eq!(b.unwrap(), "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Concurrent callers should share a fetch");
    }

    #[tokio::test]
    async fn test_waiter_fetches_itself_when_in_flight_request_fails() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        let calls = &calls;
        let failing = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(30)).await;
            Err::<String, _>("rate limited".to_string())
        };
        let succeeding = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("second try".to_string())
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("anime/5", failing),
            cache.get_or_fetch("anime/5", succeeding),
        );

        assert!(a.is_err());
        assert_eq!(b.unwrap(), "second try");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            cache.peek("anime/5").map(|entry| entry.value),
            Some("second try".to_string())
        );
    }

    #[tokio::test]
    async fn test_cached_at_timestamp_is_recorded() {
        let cache = create_test_cache();

        let before = Utc::now();
        cache
            .get_or_fetch("anime/20", || async { Ok::<_, String>("naruto".to_string()) })
            .await
            .unwrap();
        let after = Utc::now();

        let entry = cache.peek("anime/20").expect("Entry should be cached");
        assert!(entry.cached_at >= before);
        assert!(entry.cached_at <= after);
        assert_eq!(entry.expires_at - entry.cached_at, Duration::seconds(300));
        assert!(!entry.is_expired());
    }

    #[tokio::test]
    async fn test_purge_expired_removes_stale_entries() {
        let cache: RequestCache<String> = RequestCache::new(StdDuration::from_millis(20));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("a", || counted_fetch(&calls, "a"))
            .await
            .unwrap();
        cache
            .get_or_fetch("b", || counted_fetch(&calls, "b"))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.purge_expired(), 0, "Nothing left to purge");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_miss_sweeps_expired_entries_of_other_keys() {
        let cache: RequestCache<String> = RequestCache::new(StdDuration::from_millis(20));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("anime/1", || counted_fetch(&calls, "one"))
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        cache
            .get_or_fetch("anime/2", || counted_fetch(&calls, "two"))
            .await
            .unwrap();

        let slots = cache.slots();
        assert!(!slots.contains_key("anime/1"), "Expired key should be swept on a miss");
        assert!(slots.contains_key("anime/2"));
    }

    #[tokio::test]
    async fn test_abandoned_empty_slot_is_swept() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        // An empty slot nobody holds, as left when overlapping fetches all fail
        cache
            .slots()
            .insert("anime/7".to_string(), Arc::new(OnceCell::new()));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.slots().is_empty());

        cache
            .slots()
            .insert("anime/7".to_string(), Arc::new(OnceCell::new()));
        cache
            .get_or_fetch("anime/8", || counted_fetch(&calls, "eight"))
            .await
            .unwrap();
        assert!(!cache.slots().contains_key("anime/7"));
    }

    #[tokio::test]
    async fn test_sweep_keeps_slots_with_fetch_in_flight() {
        let cache = create_test_cache();

        let held = cache.slot_for("anime/9");
        assert_eq!(cache.purge_expired(), 0, "A held empty slot is in flight");
        assert!(cache.slots().contains_key("anime/9"));

        drop(held);
        assert_eq!(cache.purge_expired(), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let cache = create_test_cache();
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("anime/1", || counted_fetch(&calls, "one"))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.peek("anime/1").is_none());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let cache: RequestCache<String> = RequestCache::new(StdDuration::MAX);
        assert!(cache.ttl > Duration::weeks(52));
    }
}
