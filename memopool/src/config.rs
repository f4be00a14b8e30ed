use serde::Deserialize;

use memopool_api::{CacheScope, FailurePolicy};

use crate::error::PoolError;

pub const DEFAULT_QUEUE_RATIO: usize = 2;
pub const DEFAULT_SCOPE_KEY: &str = "default";
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "memopool-worker";

// --- Pool Configuration ---

/// Configuration used to acquire a worker pool.
///
/// Hosts usually resolve these values from their own script or
/// configuration sources; every field has a default so partial documents
/// deserialize cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfiguration {
    /// Number of worker threads. Must be at least 1.
    pub thread_count: usize,

    /// Queue capacity per worker thread. The bounded queue holds
    /// `thread_count * queue_ratio` pending items. Must be at least 1.
    pub queue_ratio: usize,

    /// Borrow a running pool already registered under `scope_key` instead
    /// of creating a new one.
    pub reuse_existing: bool,

    /// Registry key that nested scopes use to find this pool.
    pub scope_key: String,

    /// Failure policy applied by `submit` when the caller does not pick one.
    pub fail_fast: bool,

    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            thread_count: num_cpus::get(),
            queue_ratio: DEFAULT_QUEUE_RATIO,
            reuse_existing: true,
            scope_key: DEFAULT_SCOPE_KEY.to_string(),
            fail_fast: false,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfiguration {
    /// Configuration for `scope_key` with every other field defaulted.
    pub fn for_scope(scope_key: impl Into<String>) -> Self {
        Self {
            scope_key: scope_key.into(),
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn with_queue_ratio(mut self, queue_ratio: usize) -> Self {
        self.queue_ratio = queue_ratio;
        self
    }

    pub fn with_reuse_existing(mut self, reuse_existing: bool) -> Self {
        self.reuse_existing = reuse_existing;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Capacity of the bounded work queue.
    pub fn queue_capacity(&self) -> usize {
        self.thread_count.saturating_mul(self.queue_ratio)
    }

    /// Failure policy used for items submitted without an explicit one.
    pub fn default_policy(&self) -> FailurePolicy {
        FailurePolicy::from_fail_fast(self.fail_fast)
    }

    /// Check the configuration before a pool is built from it.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidConfig`] when a count is zero or the scope
    /// key is empty.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.thread_count == 0 {
            return Err(PoolError::InvalidConfig(
                "thread_count must be at least 1".to_string(),
            ));
        }
        if self.queue_ratio == 0 {
            return Err(PoolError::InvalidConfig(
                "queue_ratio must be at least 1".to_string(),
            ));
        }
        if self.scope_key.trim().is_empty() {
            return Err(PoolError::InvalidConfig(
                "scope_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-scope overrides applied on top of [`ContextConfig::default_pool`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOverrides {
    pub thread_count: Option<usize>,
    pub queue_ratio: Option<usize>,
    pub reuse_existing: Option<bool>,
    pub fail_fast: Option<bool>,
}

// --- Context Configuration ---

/// Configuration for an `ExecutionContext`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Defaults used for pools acquired through `acquire_scoped`.
    pub default_pool: PoolConfiguration,

    /// Scope used by `ExecutionContext::default_cache`.
    pub default_cache_scope: CacheScope,
}

impl ContextConfig {
    /// Merge the default pool configuration with scope-specific overrides.
    /// Values missing from `overrides` fall back to `default_pool`.
    pub fn resolve_pool(&self, scope_key: &str, overrides: &PoolOverrides) -> PoolConfiguration {
        let defaults = &self.default_pool;
        PoolConfiguration {
            thread_count: overrides.thread_count.unwrap_or(defaults.thread_count),
            queue_ratio: overrides.queue_ratio.unwrap_or(defaults.queue_ratio),
            reuse_existing: overrides.reuse_existing.unwrap_or(defaults.reuse_existing),
            scope_key: scope_key.to_string(),
            fail_fast: overrides.fail_fast.unwrap_or(defaults.fail_fast),
            thread_name_prefix: defaults.thread_name_prefix.clone(),
        }
    }
}
