//! TTL-bounded LRU storage for rendered pages.
//!
//! Writes never invalidate this cache. An entry leaves the store in exactly
//! three ways: its TTL lapses, LRU capacity evicts it, or an operator flushes
//! the store through the admin surface.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Identifies one cacheable page: request path plus a hash of the query
/// string, so `/?page=2` and `/` are distinct entries.
///
/// Keys carry no viewer dimension: whoever repopulates an entry fixes its
/// rendering (navbar included) for every viewer until TTL or flush. Only
/// wrap routes whose per-viewer differences are acceptable to share.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub path: String,
    pub query_hash: u64,
}

impl PageKey {
    pub fn new(path: impl Into<String>, query: &str) -> Self {
        Self {
            path: path.into(),
            query_hash: hash_query(query),
        }
    }
}

/// Hash a query string for cache key generation.
pub fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

/// Cached HTTP response.
#[derive(Clone)]
pub struct CachedPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    stored_at: Instant,
}

impl CachedPage {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Rendered-page cache with TTL expiry and LRU capacity bounds.
pub struct PageStore {
    pages: RwLock<LruCache<PageKey, CachedPage>>,
    ttl: Duration,
}

impl PageStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            pages: RwLock::new(LruCache::new(config.response_limit_non_zero())),
            ttl: config.ttl(),
        }
    }

    /// Look up a page. Entries past their TTL are dropped and reported as
    /// absent.
    pub fn get(&self, key: &PageKey) -> Option<CachedPage> {
        let mut pages = rw_write(&self.pages, SOURCE, "get");
        match pages.get(key) {
            Some(page) if page.is_expired(self.ttl) => {
                pages.pop(key);
                None
            }
            Some(page) => Some(page.clone()),
            None => None,
        }
    }

    /// Insert a page, returning the key evicted by capacity, if any.
    pub fn set(&self, key: PageKey, page: CachedPage) -> Option<PageKey> {
        rw_write(&self.pages, SOURCE, "set")
            .push(key, page)
            .map(|(evicted_key, _)| evicted_key)
    }

    pub fn invalidate(&self, key: &PageKey) {
        rw_write(&self.pages, SOURCE, "invalidate").pop(key);
    }

    pub fn invalidate_all(&self) {
        rw_write(&self.pages, SOURCE, "invalidate_all").clear();
    }

    /// Number of cached pages, counting entries whose TTL has lapsed but
    /// which have not been touched since.
    pub fn len(&self) -> usize {
        rw_read(&self.pages, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::thread;

    use super::*;

    fn sample_page(body: &str) -> CachedPage {
        CachedPage::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            Bytes::from(body.to_string()),
        )
    }

    fn store_with(ttl_seconds: u64, response_limit: usize) -> PageStore {
        PageStore::new(&CacheConfig {
            enabled: true,
            ttl_seconds,
            response_limit,
        })
    }

    #[test]
    fn page_cache_roundtrip() {
        let store = store_with(60, 10);
        let key = PageKey::new("/", "");

        assert!(store.get(&key).is_none());

        store.set(key.clone(), sample_page("Hello"));

        let cached = store.get(&key).expect("cached page");
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, Bytes::from("Hello"));

        store.invalidate(&key);
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn distinct_queries_get_distinct_entries() {
        let store = store_with(60, 10);
        store.set(PageKey::new("/", "page=1"), sample_page("first"));
        store.set(PageKey::new("/", "page=2"), sample_page("second"));

        let first = store.get(&PageKey::new("/", "page=1")).expect("first");
        let second = store.get(&PageKey::new("/", "page=2")).expect("second");
        assert_eq!(first.body, Bytes::from("first"));
        assert_eq!(second.body, Bytes::from("second"));
    }

    #[test]
    fn expired_entries_are_absent() {
        let store = store_with(0, 10);
        let key = PageKey::new("/", "");

        store.set(key.clone(), sample_page("gone"));
        thread::sleep(Duration::from_millis(5));
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let store = store_with(60, 10);
        store.set(PageKey::new("/", ""), sample_page("a"));
        store.set(PageKey::new("/group/cats/", ""), sample_page("b"));
        assert_eq!(store.len(), 2);

        store.invalidate_all();
        assert!(store.is_empty());
    }

    #[test]
    fn lru_eviction_reports_evicted_key() {
        let store = store_with(60, 2);
        store.set(PageKey::new("/a", ""), sample_page("a"));
        store.set(PageKey::new("/b", ""), sample_page("b"));

        let evicted = store.set(PageKey::new("/c", ""), sample_page("c"));
        assert_eq!(evicted, Some(PageKey::new("/a", "")));
        assert!(store.get(&PageKey::new("/a", "")).is_none());
        assert!(store.get(&PageKey::new("/b", "")).is_some());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store_with(60, 10);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.pages.write().expect("pages lock should be acquired");
            panic!("poison pages lock");
        }));

        store.set(PageKey::new("/", ""), sample_page("recovered"));
        assert!(store.get(&PageKey::new("/", "")).is_some());
    }
}
