//! Resolution cache: subdomain -> deployed content version.
//!
//! A read-through tier in front of the pointer store. Both positive lookups
//! and confirmed absences are cached for the configured TTL, which bounds
//! how long a fresh deploy (or a deleted subdomain) stays invisible to
//! already-warm subdomains. Transient store failures are treated as absence
//! for the failing call only and are never cached, so the next request
//! retries the store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use tokio::time::Instant;
use tracing::warn;

use crate::infra::store::PointerStore;

const METRIC_HIT: &str = "varco_resolution_cache_hit_total";
const METRIC_MISS: &str = "varco_resolution_cache_miss_total";
const METRIC_STORE_ERROR: &str = "varco_pointer_store_error_total";

struct PointerEntry {
    /// `None` is a confirmed absence, cached like any other outcome.
    version: Option<String>,
    resolved_at: Instant,
}

pub struct ResolutionCache {
    store: Arc<dyn PointerStore>,
    ttl: Duration,
    entries: DashMap<String, PointerEntry>,
}

impl ResolutionCache {
    pub fn new(store: Arc<dyn PointerStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Resolve a subdomain to its deployed content version.
    ///
    /// Returns `None` both for a confirmed absence and for a transient
    /// pointer store failure; only the former is cached.
    pub async fn resolve(&self, subdomain: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(subdomain) {
            if entry.resolved_at.elapsed() < self.ttl {
                counter!(METRIC_HIT).increment(1);
                return entry.version.clone();
            }
        }

        // Lazy purge: drop the entry only if it is still expired, so a
        // concurrent refresh is not discarded.
        self.entries
            .remove_if(subdomain, |_, entry| entry.resolved_at.elapsed() >= self.ttl);

        counter!(METRIC_MISS).increment(1);
        match self.store.lookup(subdomain).await {
            Ok(version) => {
                self.entries.insert(
                    subdomain.to_string(),
                    PointerEntry {
                        version: version.clone(),
                        resolved_at: Instant::now(),
                    },
                );
                version
            }
            Err(error) => {
                counter!(METRIC_STORE_ERROR).increment(1);
                warn!(
                    target = "varco::cache::resolution",
                    subdomain,
                    error = %error,
                    "pointer lookup failed; treating subdomain as unresolved for this request"
                );
                None
            }
        }
    }

    /// Number of live entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::infra::store::StoreError;

    use super::*;

    struct FakePointerStore {
        version: std::sync::Mutex<Option<String>>,
        failing: AtomicBool,
        lookups: AtomicUsize,
    }

    impl FakePointerStore {
        fn with_version(version: &str) -> Arc<Self> {
            Arc::new(Self {
                version: std::sync::Mutex::new(Some(version.to_string())),
                failing: AtomicBool::new(false),
                lookups: AtomicUsize::new(0),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                version: std::sync::Mutex::new(None),
                failing: AtomicBool::new(false),
                lookups: AtomicUsize::new(0),
            })
        }

        fn set_version(&self, version: &str) {
            *self.version.lock().expect("fake store lock") = Some(version.to_string());
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PointerStore for FakePointerStore {
        async fn lookup(&self, _subdomain: &str) -> Result<Option<String>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::pointer("connection refused"));
            }
            Ok(self.version.lock().expect("fake store lock").clone())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_resolves_within_ttl_hit_the_store_once() {
        let store = FakePointerStore::with_version("abc123");
        let cache = ResolutionCache::new(store.clone(), Duration::from_secs(3));

        for _ in 0..5 {
            assert_eq!(cache.resolve("foo").await.as_deref(), Some("abc123"));
        }

        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_pointer_is_observed_after_ttl() {
        let store = FakePointerStore::with_version("abc123");
        let cache = ResolutionCache::new(store.clone(), Duration::from_secs(3));

        assert_eq!(cache.resolve("foo").await.as_deref(), Some("abc123"));
        store.set_version("def456");

        // Still within TTL: the stale value is served.
        assert_eq!(cache.resolve("foo").await.as_deref(), Some("abc123"));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.resolve("foo").await.as_deref(), Some("def456"));
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_absence_is_cached() {
        let store = FakePointerStore::empty();
        let cache = ResolutionCache::new(store.clone(), Duration::from_secs(3));

        for _ in 0..5 {
            assert_eq!(cache.resolve("unknown").await, None);
        }

        assert_eq!(store.lookups(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_is_not_cached() {
        let store = FakePointerStore::with_version("abc123");
        let cache = ResolutionCache::new(store.clone(), Duration::from_secs(3));

        store.set_failing(true);
        assert_eq!(cache.resolve("foo").await, None);
        assert!(cache.is_empty());

        // The next call retries the store and succeeds.
        store.set_failing(false);
        assert_eq!(cache.resolve("foo").await.as_deref(), Some("abc123"));
        assert_eq!(store.lookups(), 2);
    }
}
