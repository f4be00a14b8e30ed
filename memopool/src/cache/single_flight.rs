use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use memopool_api::{ConstructionError, Factory};

use crate::log_cache;

use super::entry::CacheEntry;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered without touching a per-key lock.
    pub hits: u64,
    /// Lookups that did not find a published entry on the fast path.
    pub misses: u64,
    /// Misses that found the entry after waiting for another constructor.
    pub waits: u64,
    /// Successful factory invocations.
    pub constructions: u64,
    /// Failed factory invocations.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
    constructions: AtomicU64,
    failures: AtomicU64,
}

/// Single-flight, thread-safety-aware object cache.
///
/// Memoizes `factory.create(key)` so that at most one construction per key
/// is ever in flight. Callers that arrive while a construction is running
/// block on the key's lock and then reuse the published entry; callers that
/// arrive afterwards read it without blocking.
///
/// # Thread Safety
/// - The entry table and the per-key lock table are protected by their own
///   table locks, held only for existence checks and inserts
/// - The factory runs outside both table locks, holding only the per-key
///   lock, so unrelated keys never contend
/// - Failed constructions leave nothing behind; the next caller retries
/// - Per-key locks live as long as the cache, so [`clear`](Self::clear)
///   never lets a second construction of a key start beside a running one
///
/// # Examples
///
/// ```rust
/// use memopool::cache::SingleFlightCache;
/// use memopool_api::{ConstructionError, FnFactory};
///
/// let cache: SingleFlightCache<String, usize> = SingleFlightCache::new("lengths");
/// let factory = FnFactory::new(|key: &String| -> Result<usize, ConstructionError> { Ok(key.len()) });
///
/// let entry = cache.get(&"sha256:abc".to_string(), &factory).unwrap();
/// assert_eq!(*entry.value(), 10);
/// assert!(entry.is_thread_safe());
/// ```
pub struct SingleFlightCache<K, V> {
    name: String,
    entries: RwLock<HashMap<K, Arc<CacheEntry<K, V>>>>,
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    /// Bumped by `clear`; constructions started under an older generation
    /// are returned to their caller but not published.
    generation: AtomicU64,
    counters: Counters,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache. `name` only appears in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the entry for `key`, constructing it with `factory` on a miss.
    ///
    /// # Arguments
    /// * `key` - Lookup key; cloned into the cache when an entry is published
    /// * `factory` - Builds the value and reports its thread safety
    ///
    /// # Errors
    /// Forwards the factory's [`ConstructionError`] unchanged. Nothing is
    /// cached on failure, so a later call constructs again.
    ///
    /// # Panics
    /// A panic raised by the factory unwinds to this caller. The key's lock
    /// is released and no entry is published.
    pub fn get<F>(&self, key: &K, factory: &F) -> Result<Arc<CacheEntry<K, V>>, ConstructionError>
    where
        F: Factory<K, V> + ?Sized,
    {
        // Fast path: already published
        if let Some(entry) = self.peek(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let key_lock = self.key_lock(key);
        let _flight = key_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have published while we waited for the key lock
        if let Some(entry) = self.peek(key) {
            self.counters.waits.fetch_add(1, Ordering::Relaxed);
            log_cache!(self.name, "reused_after_wait");
            return Ok(entry);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let started = Instant::now();
        let value = match factory.create(key) {
            Ok(value) => value,
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                log_cache!(self.name, "construction_failed", error = %err);
                return Err(err);
            }
        };

        let thread_safe = factory.is_thread_safe(key, &value);
        let entry = Arc::new(CacheEntry::new(key.clone(), value, thread_safe));
        self.counters.constructions.fetch_add(1, Ordering::Relaxed);

        let published = {
            let mut entries = self.write_entries();
            // `clear` bumps the generation under the same write lock
            let current = self.generation.load(Ordering::SeqCst) == generation;
            if current {
                entries.insert(key.clone(), Arc::clone(&entry));
            }
            current
        };

        log_cache!(
            self.name,
            "constructed",
            thread_safe,
            published,
            elapsed_ms = started.elapsed().as_millis() as u64
        );

        Ok(entry)
    }

    /// Return the published entry for `key` without ever constructing it.
    pub fn peek(&self, key: &K) -> Option<Arc<CacheEntry<K, V>>> {
        self.read_entries().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.read_entries().contains_key(key)
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Drop every published entry.
    ///
    /// Entries already handed out stay alive for as long as their holders
    /// keep them. A construction running during `clear` still hands its
    /// value to its caller but does not publish it.
    pub fn clear(&self) {
        let dropped = {
            let mut entries = self.write_entries();
            let dropped = entries.len();
            entries.clear();
            self.generation.fetch_add(1, Ordering::SeqCst);
            dropped
        };
        log_cache!(self.name, "cleared", entries = dropped);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            waits: self.counters.waits.load(Ordering::Relaxed),
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Get or create the lock that serializes constructions of `key`.
    fn key_lock(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.lock_table();
        if let Some(lock) = locks.get(key) {
            return Arc::clone(lock);
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(key.clone(), Arc::clone(&lock));
        lock
    }

    // Table accessors recover from poisoning: a panic can only happen in
    // the factory, which never runs while a table lock is held.

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<K, Arc<CacheEntry<K, V>>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<K, Arc<CacheEntry<K, V>>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> fmt::Debug for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("name", &self.name)
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
