use std::time::Duration;
use thiserror::Error;

/// Errors related to worker pools.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool '{scope}' is not accepting work")]
    Unavailable { scope: String },
    #[error("Worker pool '{scope}' was terminated prematurely by a failed work item: {cause}")]
    PrematureTermination { scope: String, cause: String },
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
    #[error("Worker pool '{scope}' did not drain within {after:?}")]
    DrainTimeout { scope: String, after: Duration },
    #[error("Failed to join worker threads of '{scope}': {reason}")]
    Join { scope: String, reason: String },
}

/// Errors related to the execution context.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Cache '{name}' already exists with a different key or value type")]
    CacheTypeMismatch { name: String },
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}
