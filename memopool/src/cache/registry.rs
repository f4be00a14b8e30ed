use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use memopool_api::CacheScope;

use crate::error::ContextError;
use crate::log_cache;

use super::single_flight::SingleFlightCache;

type AnyCache = Arc<dyn Any + Send + Sync>;

/// Named caches of arbitrary key/value types belonging to one scope.
pub(crate) struct CacheRegistry {
    scope: CacheScope,
    caches: Mutex<HashMap<String, AnyCache>>,
}

impl CacheRegistry {
    pub(crate) fn new(scope: CacheScope) -> Self {
        Self {
            scope,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cache registered under `name`, creating it on first use.
    ///
    /// # Errors
    /// Returns [`ContextError::CacheTypeMismatch`] when `name` is already
    /// taken by a cache with other key or value types.
    pub(crate) fn get_or_create<K, V>(&self, name: &str) -> Result<Arc<SingleFlightCache<K, V>>, ContextError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let mut caches = self.table();
        if let Some(existing) = caches.get(name) {
            return Arc::clone(existing)
                .downcast::<SingleFlightCache<K, V>>()
                .map_err(|_| ContextError::CacheTypeMismatch { name: name.to_string() });
        }

        let cache = Arc::new(SingleFlightCache::<K, V>::new(name));
        caches.insert(name.to_string(), Arc::clone(&cache) as AnyCache);
        log_cache!(name, "registered", scope = ?self.scope);
        Ok(cache)
    }

    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }

    pub(crate) fn scope(&self) -> CacheScope {
        self.scope
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, AnyCache>> {
        self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
