use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::PoolConfiguration;
use crate::error::PoolError;
use crate::log_pool;

use super::pool::WorkerPool;

/// Pools registered by scope key.
///
/// A registry belongs to an execution context. The first scope that acquires
/// a pool for a key owns it; nested scopes acquiring the same key with
/// `reuse_existing` borrow it.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<HashMap<String, Arc<WorkerPool>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the running pool registered for `config.scope_key` or create a
    /// new owned one.
    ///
    /// # Arguments
    /// * `config` - Pool sizing and reuse settings
    ///
    /// # Returns
    /// A lease that is owned when a new pool was created and borrowed when an
    /// existing pool was reused. A newly created pool is registered under its
    /// scope key unless a running pool is already registered there.
    ///
    /// # Errors
    /// - [`PoolError::InvalidConfig`] for an invalid configuration
    /// - [`PoolError::ThreadSpawn`] if worker threads cannot be started
    pub fn acquire(self: &Arc<Self>, config: &PoolConfiguration) -> Result<PoolLease, PoolError> {
        config.validate()?;

        let mut pools = self.table();
        let existing = pools
            .get(&config.scope_key)
            .filter(|pool| pool.state().is_running())
            .cloned();

        if config.reuse_existing {
            if let Some(pool) = existing {
                debug!(scope = %config.scope_key, pool_id = %pool.id(), "borrowing registered pool");
                return Ok(PoolLease::borrowed(pool));
            }
        }

        let pool = Arc::new(WorkerPool::new(config.clone())?);
        if existing.is_none() {
            pools.insert(config.scope_key.clone(), Arc::clone(&pool));
        }

        Ok(PoolLease::owned(pool, Arc::downgrade(self)))
    }

    /// The pool currently registered for `scope_key`, in any state.
    pub fn lookup(&self, scope_key: &str) -> Option<Arc<WorkerPool>> {
        self.table().get(scope_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Remove `pool` from the registry if it is the one registered for its
    /// scope key.
    fn unregister(&self, pool: &Arc<WorkerPool>) {
        let mut pools = self.table();
        let registered = pools
            .get(pool.scope_key())
            .map_or(false, |current| Arc::ptr_eq(current, pool));
        if registered {
            pools.remove(pool.scope_key());
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<WorkerPool>>> {
        self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes: Vec<String> = self.table().keys().cloned().collect();
        f.debug_struct("PoolRegistry").field("scopes", &scopes).finish()
    }
}

/// A pool together with whether the holder owns it.
///
/// Only the owner shuts the pool down. Releasing a borrowed lease does
/// nothing. Dropping an owned lease without releasing it starts a graceful
/// shutdown but does not wait for it.
pub struct PoolLease {
    pool: Arc<WorkerPool>,
    owned: bool,
    registry: Option<Weak<PoolRegistry>>,
    released: bool,
}

impl PoolLease {
    fn owned(pool: Arc<WorkerPool>, registry: Weak<PoolRegistry>) -> Self {
        Self {
            pool,
            owned: true,
            registry: Some(registry),
            released: false,
        }
    }

    fn borrowed(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            owned: false,
            registry: None,
            released: false,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// A borrowed lease on the same pool, for handing to a nested scope.
    pub fn lend(&self) -> PoolLease {
        PoolLease::borrowed(Arc::clone(&self.pool))
    }

    /// Release the lease.
    ///
    /// For an owned pool: stop admitting work, wait (without timeout) for
    /// queued and running items to finish, and unregister the pool. For a
    /// borrowed pool this is a no-op.
    ///
    /// # Errors
    /// - [`PoolError::PrematureTermination`] if a fail-fast item aborted the
    ///   pool; this is how an asynchronous work failure becomes visible
    /// - [`PoolError::Join`] if a worker thread could not be joined and the
    ///   pool was not aborted
    pub fn release(mut self) -> Result<(), PoolError> {
        self.released = true;
        if !self.owned {
            return Ok(());
        }

        self.begin_release();
        self.pool.finish()
    }

    /// Like [`release`](Self::release), but gives up waiting after
    /// `deadline`.
    ///
    /// # Errors
    /// In addition to the errors of `release`, returns
    /// [`PoolError::DrainTimeout`] when the workers did not finish in time.
    /// They keep draining in the background.
    pub async fn release_timeout(mut self, deadline: Duration) -> Result<(), PoolError> {
        self.released = true;
        if !self.owned {
            return Ok(());
        }

        self.begin_release();

        let pool = Arc::clone(&self.pool);
        let drain = tokio::task::spawn_blocking(move || pool.finish());

        match tokio::time::timeout(deadline, drain).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PoolError::Join {
                scope: self.pool.scope_key().to_string(),
                reason: join_error.to_string(),
            }),
            Err(_) => {
                warn!(scope = %self.pool.scope_key(), ?deadline, "pool did not drain in time");
                Err(PoolError::DrainTimeout {
                    scope: self.pool.scope_key().to_string(),
                    after: deadline,
                })
            }
        }
    }

    fn begin_release(&self) {
        if let Some(cause) = self.pool.abort_cause() {
            warn!(
                scope = %self.pool.scope_key(),
                cause = %cause,
                "releasing a pool that was aborted by a failed work item"
            );
        }

        self.pool.shutdown();
        self.unregister();
        log_pool!(self.pool.scope_key(), "released", pool_id = %self.pool.id());
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            registry.unregister(&self.pool);
        }
    }
}

impl Deref for PoolLease {
    type Target = WorkerPool;

    fn deref(&self) -> &WorkerPool {
        &self.pool
    }
}

impl fmt::Debug for PoolLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLease")
            .field("pool", &self.pool)
            .field("owned", &self.owned)
            .finish()
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        if self.owned && !self.released {
            warn!(
                scope = %self.pool.scope_key(),
                "owned pool lease dropped without release, shutting down in background"
            );
            self.pool.shutdown();
            self.unregister();
        }
    }
}
