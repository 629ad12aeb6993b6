//! In-memory TTL cache for upstream responses.
//!
//! Entries expire independently. Expired entries are evicted lazily, on the
//! first read that observes them; [`CacheStore::clear_expired`] is available
//! for callers that want an explicit sweep.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default time-to-live applied when `set` gets no override.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug)]
struct CacheInner<T> {
    map: HashMap<String, CacheEntry<T>>,
    default_ttl: Duration,
}

/// Thread-safe key/value cache with per-entry expiry.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Debug)]
pub struct CacheStore<T> {
    inner: Arc<RwLock<CacheInner<T>>>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T: Clone + Send + Sync> CacheStore<T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                map: HashMap::new(),
                default_ttl,
            })),
        }
    }

    /// A cache that stores nothing: every `set` is a no-op, even with a TTL
    /// override, so `get_or_try_insert_with` always fetches.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn is_disabled(&self) -> bool {
        self.inner.read().await.default_ttl == Duration::ZERO
    }

    /// Store `data` under `key`, replacing any existing entry.
    ///
    /// `ttl` overrides the store default for this entry only. A store with a
    /// zero default TTL is disabled and ignores every write.
    pub async fn set(&self, key: impl Into<String>, data: T, ttl: Option<Duration>) {
        let mut store = self.inner.write().await;
        if store.default_ttl == Duration::ZERO {
            return;
        }

        let ttl = ttl.unwrap_or(store.default_ttl);
        store.map.insert(
            key.into(),
            CacheEntry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns the payload if present and unexpired. An expired entry is
    /// removed as a side effect.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let store = self.inner.read().await;
            match store.map.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        let mut store = self.inner.write().await;
        // Another writer may have refreshed the key between the two locks.
        match store.map.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.data.clone()),
            Some(_) => {
                store.map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Return the cached value, or run `fetch` and cache its `Ok` result.
    ///
    /// Errors are passed through and never cached.
    pub async fn get_or_try_insert_with<E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let fresh = fetch().await?;
        self.set(key, fresh.clone(), ttl).await;
        Ok(fresh)
    }

    pub async fn remove(&self, key: &str) {
        self.inner.write().await.map.remove(key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }

    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.inner
            .write()
            .await
            .map
            .retain(|_, entry| !entry.is_expired(now));
    }

    /// Number of stored entries, expired ones included until they are evicted.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
