use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// A published cache entry.
///
/// Entries are immutable once published: the value and the thread-safety
/// flag are fixed at construction time and never re-queried.
pub struct CacheEntry<K, V> {
    key: K,
    value: V,
    thread_safe: bool,
    created_at: Instant,
    /// Serializes `with_access` calls for values that are not thread-safe.
    access: Mutex<()>,
}

impl<K, V> CacheEntry<K, V> {
    pub(crate) fn new(key: K, value: V, thread_safe: bool) -> Self {
        Self {
            key,
            value,
            thread_safe,
            created_at: Instant::now(),
            access: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// The cached value.
    ///
    /// If [`is_thread_safe`](Self::is_thread_safe) is `false`, callers that
    /// use the value from several threads must serialize access themselves,
    /// for instance through [`with_access`](Self::with_access).
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Whether the factory reported the value as safe for concurrent use.
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Run `f` against the value, holding an entry-local lock when the value
    /// is not thread-safe.
    ///
    /// Thread-safe values are handed out without locking.
    pub fn with_access<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        if self.thread_safe {
            return f(&self.value);
        }
        let _guard = self.access.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&self.value)
    }
}

impl<K: fmt::Debug, V> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("thread_safe", &self.thread_safe)
            .finish()
    }
}
