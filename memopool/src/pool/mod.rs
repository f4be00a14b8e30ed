//! # Managed Worker Pool Module
//!
//! Bounded-queue thread pools with blocking admission, fail-fast abort
//! propagation, and owned/borrowed pool leases across nested scopes.
//!
//! ## Key Concepts
//! - Backpressure: a full queue blocks the submitter instead of rejecting
//!   or dropping work while the pool is healthy
//! - Fail-fast: a failing item can abort the pool, discarding queued work;
//!   the owner learns about it when it releases the pool
//! - Ownership: the scope that created a pool shuts it down; borrowers never do
//!
//! ## State Machine
//! `Running -> ShuttingDown -> Terminated`, monotonic.
//!
//! ## Thread Safety
//! - The queue is a bounded `flume` channel; admission is closed by
//!   dropping the producer side
//! - Pool state is a single atomic advanced with `fetch_max`
//! - Recorded failures live in a lock-free `SegQueue`

mod pool;
mod queue;
mod registry;
mod worker;

pub use pool::{PoolId, PoolMetrics, WorkFailure, WorkerPool};
pub use registry::{PoolLease, PoolRegistry};
