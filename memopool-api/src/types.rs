//! Common type definitions shared by the cache and the worker pool.

use serde::Deserialize;

/// Lifecycle state of a worker pool.
///
/// Transitions are monotonic: `Running -> ShuttingDown -> Terminated`.
/// The discriminants are ordered so the state can be advanced with an
/// atomic `fetch_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoolState {
    /// Accepting and executing work.
    Running = 0,

    /// No new work is accepted; queued and in-flight items are finishing,
    /// or were discarded by a fail-fast abort.
    ShuttingDown = 1,

    /// Every worker thread has exited.
    Terminated = 2,
}

impl PoolState {
    /// Decode a state previously stored with `as usize`.
    pub fn from_usize(value: usize) -> Self {
        match value {
            0 => PoolState::Running,
            1 => PoolState::ShuttingDown,
            _ => PoolState::Terminated,
        }
    }

    /// Whether the pool still admits work.
    pub fn is_running(self) -> bool {
        self == PoolState::Running
    }
}

/// What a pool does when a work item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep processing the remaining items.
    #[default]
    Continue,

    /// Stop admitting work, discard everything still queued, and make the
    /// owning scope's release fail.
    FailFast,
}

impl FailurePolicy {
    /// Map the boolean `fail_fast` configuration flag onto a policy.
    pub fn from_fail_fast(fail_fast: bool) -> Self {
        if fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        }
    }

    pub fn is_fail_fast(self) -> bool {
        self == FailurePolicy::FailFast
    }
}

/// Lifetime of a cache held by an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Lives as long as the root context, shared by every child context.
    #[default]
    Process,

    /// Lives as long as one logical request (one child context).
    Request,
}
