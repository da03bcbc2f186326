//! Content cache: `(version, path)` -> fetched payload.
//!
//! A read-through tier in front of the object store. Entries are bounded two
//! ways: a byte budget enforced by least-recently-used eviction, and a TTL
//! checked on access. Concurrent misses for the same key coalesce into a
//! single in-flight fetch whose outcome, success or failure, is shared by
//! every waiter, so a cold cache under a burst issues one store read, not N.
//!
//! Only successful fetches are cached. Not-found results stay uncached
//! because SPA fallback probing and subsequent deploys make them transient;
//! transient store errors stay uncached so the next request retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::infra::store::ObjectStore;
use crate::util::bytes::format_bytes;

use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_write};

const SOURCE: &str = "cache::content";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const METRIC_HIT: &str = "varco_content_cache_hit_total";
const METRIC_MISS: &str = "varco_content_cache_miss_total";
const METRIC_EVICT: &str = "varco_content_cache_evict_total";
const METRIC_EXPIRED: &str = "varco_content_cache_expired_total";
const METRIC_OVERSIZE: &str = "varco_content_cache_oversize_total";
const METRIC_STORE_ERROR: &str = "varco_object_store_error_total";
const METRIC_FETCH_MS: &str = "varco_object_fetch_ms";

/// A servable file: materialized bytes plus the content type to respond with.
#[derive(Debug, Clone)]
pub struct SitePayload {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    version: String,
    path: String,
}

struct Entry {
    payload: SitePayload,
    size: u64,
    inserted_at: Instant,
}

/// LRU entries plus the running byte total they account for.
struct Slab {
    entries: LruCache<ObjectKey, Entry>,
    bytes: u64,
}

type FetchFuture = Shared<BoxFuture<'static, Option<SitePayload>>>;

/// Cheaply cloneable handle; all clones share one cache.
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
    max_bytes: u64,
    slab: RwLock<Slab>,
    in_flight: Mutex<HashMap<ObjectKey, FetchFuture>>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                ttl: config.content_ttl,
                max_bytes: config.max_content_bytes,
                slab: RwLock::new(Slab {
                    entries: LruCache::unbounded(),
                    bytes: 0,
                }),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fetch a file belonging to a deployed version, through the cache.
    ///
    /// Returns `None` when the object store has no such object or failed
    /// transiently; neither outcome is cached.
    pub async fn get(&self, version: &str, path: &str) -> Option<SitePayload> {
        let key = ObjectKey {
            version: version.to_string(),
            path: path.to_string(),
        };

        if let Some(payload) = self.inner.lookup(&key) {
            counter!(METRIC_HIT).increment(1);
            return Some(payload);
        }
        counter!(METRIC_MISS).increment(1);

        self.inner.clone().join_flight(key).await
    }

    /// Total bytes currently held by live entries.
    pub fn usage_bytes(&self) -> u64 {
        rw_write(&self.inner.slab, SOURCE, "usage_bytes").bytes
    }

    /// Number of live entries, expired or not.
    pub fn len(&self) -> usize {
        rw_write(&self.inner.slab, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    /// Cache lookup with TTL enforcement. A hit refreshes LRU recency; an
    /// expired entry is dropped and reported as a miss.
    fn lookup(&self, key: &ObjectKey) -> Option<SitePayload> {
        let mut slab = rw_write(&self.slab, SOURCE, "lookup");

        let expired = match slab.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.payload.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = slab.entries.pop(key) {
                slab.bytes -= entry.size;
            }
            counter!(METRIC_EXPIRED).increment(1);
        }
        None
    }

    /// Join the in-flight fetch for a key, creating it if absent.
    ///
    /// The returned future is shared: every concurrent waiter polls the same
    /// underlying fetch and observes the same outcome, and the entry retires
    /// itself once that fetch completes.
    fn join_flight(self: Arc<Self>, key: ObjectKey) -> FetchFuture {
        let mut in_flight = mutex_lock(&self.in_flight, SOURCE, "join_flight");
        if let Some(existing) = in_flight.get(&key) {
            return existing.clone();
        }

        let inner = self.clone();
        let flight_key = key.clone();
        let fetch = async move {
            let outcome = inner.fetch_and_admit(&flight_key).await;
            mutex_lock(&inner.in_flight, SOURCE, "retire_flight").remove(&flight_key);
            outcome
        }
        .boxed()
        .shared();

        in_flight.insert(key, fetch.clone());
        fetch
    }

    async fn fetch_and_admit(&self, key: &ObjectKey) -> Option<SitePayload> {
        let started_at = Instant::now();
        let fetched = self.store.fetch(&key.version, &key.path).await;
        histogram!(METRIC_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match fetched {
            Ok(Some(object)) => {
                let content_type = object
                    .content_type
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| guess_content_type(&key.path));
                let payload = SitePayload {
                    body: object.body,
                    content_type,
                };
                self.admit(key, &payload);
                Some(payload)
            }
            Ok(None) => None,
            Err(error) => {
                counter!(METRIC_STORE_ERROR).increment(1);
                warn!(
                    target = "varco::cache::content",
                    version = %key.version,
                    path = %key.path,
                    error = %error,
                    "object fetch failed; treating as not found for this request"
                );
                None
            }
        }
    }

    /// Insert a fetched payload, evicting least-recently-used entries until
    /// it fits the byte budget. Payloads larger than the whole budget are
    /// served uncached.
    fn admit(&self, key: &ObjectKey, payload: &SitePayload) {
        let size = payload.body.len() as u64;
        if size > self.max_bytes {
            counter!(METRIC_OVERSIZE).increment(1);
            debug!(
                target = "varco::cache::content",
                version = %key.version,
                path = %key.path,
                size = %format_bytes(size),
                budget = %format_bytes(self.max_bytes),
                "payload exceeds the cache budget; serving uncached"
            );
            return;
        }

        let mut slab = rw_write(&self.slab, SOURCE, "admit");

        if let Some(previous) = slab.entries.pop(key) {
            slab.bytes -= previous.size;
        }

        while slab.bytes + size > self.max_bytes {
            match slab.entries.pop_lru() {
                Some((_, evicted)) => {
                    slab.bytes -= evicted.size;
                    counter!(METRIC_EVICT).increment(1);
                }
                None => break,
            }
        }

        slab.entries.push(
            key.clone(),
            Entry {
                payload: payload.clone(),
                size,
                inserted_at: Instant::now(),
            },
        );
        slab.bytes += size;
    }
}

fn guess_content_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::infra::store::{StoreError, StoredObject};

    use super::*;

    struct FakeObjectStore {
        objects: HashMap<String, StoredObject>,
        delay: Duration,
        fetches: AtomicUsize,
    }

    impl FakeObjectStore {
        fn new() -> Self {
            Self {
                objects: HashMap::new(),
                delay: Duration::ZERO,
                fetches: AtomicUsize::new(0),
            }
        }

        fn with_object(mut self, key: &str, body: &[u8], content_type: Option<&str>) -> Self {
            self.objects.insert(
                key.to_string(),
                StoredObject {
                    body: Bytes::copy_from_slice(body),
                    content_type: content_type.map(str::to_string),
                },
            );
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn fetch(
            &self,
            version: &str,
            path: &str,
        ) -> Result<Option<StoredObject>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.objects.get(&format!("{version}/{path}")).cloned())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn config(max_content_bytes: u64) -> CacheConfig {
        CacheConfig {
            max_content_bytes,
            ..CacheConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_gets_fetch_once() {
        let store = Arc::new(
            FakeObjectStore::new().with_object("abc/index.html", b"<html>Foo</html>", None),
        );
        let cache = ContentCache::new(store.clone(), &config(1024));

        for _ in 0..5 {
            let payload = cache.get("abc", "index.html").await.expect("cached payload");
            assert_eq!(payload.body, Bytes::from_static(b"<html>Foo</html>"));
        }

        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_coalesce_into_one_fetch() {
        let store = Arc::new(
            FakeObjectStore::new()
                .with_object("abc/app.js", b"console.log(1)", Some("text/javascript"))
                .with_delay(Duration::from_millis(50)),
        );
        let cache = ContentCache::new(store.clone(), &config(1024));

        let results =
            futures::future::join_all((0..8).map(|_| cache.get("abc", "app.js"))).await;

        for payload in results {
            let payload = payload.expect("shared payload");
            assert_eq!(payload.body, Bytes::from_static(b"console.log(1)"));
            assert_eq!(payload.content_type, "text/javascript");
        }
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_never_cached() {
        let store = Arc::new(FakeObjectStore::new());
        let cache = ContentCache::new(store.clone(), &config(1024));

        assert!(cache.get("abc", "missing.txt").await.is_none());
        assert!(cache.get("abc", "missing.txt").await.is_none());

        assert_eq!(store.fetches(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_is_least_recently_used_first() {
        let store = Arc::new(
            FakeObjectStore::new()
                .with_object("abc/a.css", &[0u8; 40], None)
                .with_object("abc/b.css", &[0u8; 40], None)
                .with_object("abc/c.css", &[0u8; 40], None),
        );
        let cache = ContentCache::new(store.clone(), &config(100));

        cache.get("abc", "a.css").await.expect("a");
        cache.get("abc", "b.css").await.expect("b");
        // Touch `a` so `b` is now the least recently used.
        cache.get("abc", "a.css").await.expect("a again");
        assert_eq!(store.fetches(), 2);

        cache.get("abc", "c.css").await.expect("c");
        assert!(cache.usage_bytes() <= 100);

        // `a` survived, `b` was evicted and needs a refetch.
        cache.get("abc", "a.css").await.expect("a cached");
        assert_eq!(store.fetches(), 3);
        cache.get("abc", "b.css").await.expect("b refetched");
        assert_eq!(store.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn live_size_never_exceeds_the_budget() {
        let store = Arc::new(
            FakeObjectStore::new()
                .with_object("abc/a.bin", &[0u8; 60], None)
                .with_object("abc/b.bin", &[0u8; 60], None)
                .with_object("abc/c.bin", &[0u8; 60], None),
        );
        let cache = ContentCache::new(store, &config(128));

        for path in ["a.bin", "b.bin", "c.bin", "a.bin"] {
            cache.get("abc", path).await.expect("payload");
            assert!(cache.usage_bytes() <= 128);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_refetched() {
        let store = Arc::new(
            FakeObjectStore::new().with_object("abc/index.html", b"<html></html>", None),
        );
        let ttl = CacheConfig::default().content_ttl;
        let cache = ContentCache::new(store.clone(), &config(1024));

        cache.get("abc", "index.html").await.expect("first");
        tokio::time::advance(ttl + Duration::from_secs(1)).await;
        cache.get("abc", "index.html").await.expect("refetched");

        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_payloads_are_served_uncached() {
        let store = Arc::new(FakeObjectStore::new().with_object("abc/big.bin", &[0u8; 200], None));
        let cache = ContentCache::new(store.clone(), &config(100));

        let payload = cache.get("abc", "big.bin").await.expect("served");
        assert_eq!(payload.body.len(), 200);
        assert!(cache.is_empty());

        // Every request for it goes back to the store.
        cache.get("abc", "big.bin").await.expect("served again");
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn content_type_falls_back_to_extension_then_binary() {
        let store = Arc::new(
            FakeObjectStore::new()
                .with_object("abc/styles.css", b"body{}", None)
                .with_object("abc/data", b"\x00\x01", None)
                .with_object("abc/page.html", b"<html></html>", Some("text/html")),
        );
        let cache = ContentCache::new(store, &config(1024));

        let css = cache.get("abc", "styles.css").await.expect("css");
        assert_eq!(css.content_type, "text/css");

        let raw = cache.get("abc", "data").await.expect("raw");
        assert_eq!(raw.content_type, "application/octet-stream");

        let html = cache.get("abc", "page.html").await.expect("html");
        assert_eq!(html.content_type, "text/html");
    }
}
