//! # Execution Context
//!
//! Explicit home for the pool registry and the named caches of one
//! execution (a process, a script run, a request). Passing a context around
//! replaces process-wide static registries, so lifetimes are visible and
//! requests cannot leak state into each other.
//!
//! ## Scoping
//! - Process caches and the pool registry are shared by a context and all
//!   of its children
//! - Request caches belong to one context and are discarded with it

use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use memopool_api::CacheScope;

use crate::cache::{CacheRegistry, SingleFlightCache};
use crate::config::{ContextConfig, PoolConfiguration, PoolOverrides};
use crate::error::{ContextError, PoolError};
use crate::pool::{PoolLease, PoolRegistry};

/// Execution context holding pools and caches for one scope.
///
/// # Examples
///
/// ```rust
/// use memopool::{CacheScope, ExecutionContext, FnFactory, PoolConfiguration, ConstructionError};
///
/// let process = ExecutionContext::new("process");
/// let request = process.child("request-1");
///
/// let scripts = request.cache::<String, String>("scripts", CacheScope::Process).unwrap();
/// let compile = FnFactory::new(|src: &String| -> Result<String, ConstructionError> { Ok(src.trim().to_string()) });
/// let compiled = scripts.get(&" 1 + 1 ".to_string(), &compile).unwrap();
/// assert_eq!(compiled.value(), "1 + 1");
///
/// let lease = request
///     .acquire_pool(&PoolConfiguration::for_scope("fan-out").with_threads(2))
///     .unwrap();
/// lease.execute("noop", || Ok(())).unwrap();
/// lease.release().unwrap();
/// ```
pub struct ExecutionContext {
    name: String,
    config: ContextConfig,
    pools: Arc<PoolRegistry>,
    process_caches: Arc<CacheRegistry>,
    request_caches: CacheRegistry,
    is_child: bool,
}

impl ExecutionContext {
    /// Create a root context with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ContextConfig::default())
    }

    /// Create a root context.
    pub fn with_config(name: impl Into<String>, config: ContextConfig) -> Self {
        Self {
            name: name.into(),
            config,
            pools: Arc::new(PoolRegistry::new()),
            process_caches: Arc::new(CacheRegistry::new(CacheScope::Process)),
            request_caches: CacheRegistry::new(CacheScope::Request),
            is_child: false,
        }
    }

    /// Create a nested context sharing this context's pools and process
    /// caches, with its own request caches.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(parent = %self.name, context = %name, "entering child context");
        Self {
            name,
            config: self.config.clone(),
            pools: Arc::clone(&self.pools),
            process_caches: Arc::clone(&self.process_caches),
            request_caches: CacheRegistry::new(CacheScope::Request),
            is_child: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    /// Acquire a pool; see [`PoolRegistry::acquire`].
    pub fn acquire_pool(&self, config: &PoolConfiguration) -> Result<PoolLease, PoolError> {
        self.pools.acquire(config)
    }

    /// Acquire a pool for `scope_key`, starting from the context's default
    /// pool configuration and applying `overrides`.
    pub fn acquire_scoped(&self, scope_key: &str, overrides: &PoolOverrides) -> Result<PoolLease, PoolError> {
        let config = self.config.resolve_pool(scope_key, overrides);
        self.pools.acquire(&config)
    }

    /// The cache named `name` in `scope`, created on first use.
    ///
    /// # Errors
    /// Returns [`ContextError::CacheTypeMismatch`] if a cache with that name
    /// already exists in the scope with other key or value types.
    pub fn cache<K, V>(&self, name: &str, scope: CacheScope) -> Result<Arc<SingleFlightCache<K, V>>, ContextError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        match scope {
            CacheScope::Process => self.process_caches.get_or_create(name),
            CacheScope::Request => self.request_caches.get_or_create(name),
        }
    }

    /// The cache named `name` in the configured default scope.
    pub fn default_cache<K, V>(&self, name: &str) -> Result<Arc<SingleFlightCache<K, V>>, ContextError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        self.cache(name, self.config.default_cache_scope)
    }

    /// Number of caches in `scope` visible from this context.
    pub fn cache_count(&self, scope: CacheScope) -> usize {
        match scope {
            CacheScope::Process => self.process_caches.len(),
            CacheScope::Request => self.request_caches.len(),
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.is_child {
            debug!(
                context = %self.name,
                scope = ?self.request_caches.scope(),
                caches = self.request_caches.len(),
                "leaving child context, discarding request caches"
            );
        }
    }
}
