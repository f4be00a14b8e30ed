// Memopool
//
// Single-flight object cache and managed worker pool used by task runtimes
// to memoize expensive constructions and to run units of work concurrently
// with bounded resource usage.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod pool;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStats, SingleFlightCache};
pub use config::{ContextConfig, PoolConfiguration, PoolOverrides};
pub use context::ExecutionContext;
pub use error::{ContextError, PoolError};
pub use pool::{PoolId, PoolLease, PoolMetrics, PoolRegistry, WorkFailure, WorkerPool};

pub use memopool_api::{
    runnable, CacheScope, ConstructionError, FailurePolicy, Factory, FnFactory, FnRunnable, PoolState,
    Runnable, WorkResult,
};
