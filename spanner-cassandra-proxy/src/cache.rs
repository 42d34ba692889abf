//! The attachments cache: a process-wide bounded LRU mapping attachment
//! keys to opaque, server-negotiated string values. Shared across every
//! connection of one listener, mutated by the inbound path on state updates
//! and read (but never written) by the prepared-id extractor.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// ~100 MiB of cache footprint at an assumed ~256 B per entry
/// (key + value + bookkeeping). Cassandra prepared-statement attachments
/// are small, short-lived strings, so this is a generous headroom rather
/// than a tight fit; entries beyond it are evicted LRU-first.
pub const DEFAULT_MAX_ENTRIES: usize = 390_625;

pub struct AttachmentsCache {
    inner: Mutex<LruCache<String, String>>,
}

impl AttachmentsCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: String, value: String) {
        self.inner.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AttachmentsCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

/// Builds the attachment key for a prepared-query id: `"pqid/" + utf8(id)`.
/// Prepared ids are opaque bytes, not necessarily valid UTF-8, so malformed
/// sequences are replaced rather than rejected — the key only needs to be a
/// stable, collision-free handle, not a human-readable string.
pub fn prepared_id_key(query_id: &[u8]) -> String {
    format!("pqid/{}", String::from_utf8_lossy(query_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_the_most_recent_put() {
        let cache = AttachmentsCache::new(4);
        cache.put("a".into(), "1".into());
        cache.put("a".into(), "2".into());
        assert_eq!(cache.get("a"), Some("2".into()));
    }

    #[test]
    fn missing_key_returns_none() {
        let cache = AttachmentsCache::new(4);
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn eviction_is_strictly_lru() {
        let cache = AttachmentsCache::new(2);
        cache.put("a".into(), "1".into());
        cache.put("b".into(), "2".into());
        // touch "a" so "b" becomes the least-recently-used entry
        assert_eq!(cache.get("a"), Some("1".into()));
        cache.put("c".into(), "3".into());

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1".into()));
        assert_eq!(cache.get("c"), Some("3".into()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn prepared_id_key_is_prefixed() {
        assert_eq!(prepared_id_key(b"QID"), "pqid/QID");
    }
}
