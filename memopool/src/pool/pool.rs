use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_queue::SegQueue;
use tracing::{debug, warn};
use uuid::Uuid;

use memopool_api::{runnable, FailurePolicy, PoolState, Runnable, WorkResult};

use crate::config::PoolConfiguration;
use crate::error::PoolError;
use crate::logging::current_subscriber;
use crate::{log_error, log_pool};

use super::queue::{Claim, WorkItem, WorkQueue};
use super::worker::Worker;

/// Unique identifier of a worker pool, used in logs.
pub type PoolId = Uuid;

/// A failed work item as recorded by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkFailure {
    /// Name reported by the item's `Runnable::name`
    pub item: String,
    /// Error message, or the panic payload for items that panicked
    pub message: String,
    /// Policy the item was submitted with
    pub policy: FailurePolicy,
}

impl fmt::Display for WorkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work item '{}' failed: {}", self.item, self.message)
    }
}

/// Metrics about the pool state
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub pool_id: PoolId,
    pub scope_key: String,
    pub thread_count: usize,
    pub queue_capacity: usize,
    /// Items waiting in the queue (snapshot)
    pub queue_length: usize,
    pub state: PoolState,
    /// Worker threads that have not exited yet
    pub live_workers: usize,
    /// Items currently executing
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    /// Items removed from the queue without running, by a fail-fast abort
    pub discarded: u64,
}

/// State shared between the pool handle and its worker threads.
pub(crate) struct PoolShared {
    pub(crate) id: PoolId,
    pub(crate) scope_key: String,
    pub(crate) queue: WorkQueue,
    state: AtomicUsize,
    live_workers: AtomicUsize,
    pub(crate) active: AtomicUsize,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) discarded: AtomicU64,
    failures: SegQueue<WorkFailure>,
    abort_cause: Mutex<Option<WorkFailure>>,
}

impl PoolShared {
    pub(crate) fn state(&self) -> PoolState {
        PoolState::from_usize(self.state.load(Ordering::SeqCst))
    }

    /// Move the state forward to `to`; never moves it back. Returns the
    /// previous state.
    fn advance(&self, to: PoolState) -> PoolState {
        PoolState::from_usize(self.state.fetch_max(to as usize, Ordering::SeqCst))
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort_slot().is_some()
    }

    fn abort_slot(&self) -> MutexGuard<'_, Option<WorkFailure>> {
        self.abort_cause.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log and record a failed item, then apply its failure policy.
    pub(crate) fn record_failure(&self, failure: WorkFailure) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        log_error!(
            failure,
            scope = %self.scope_key,
            pool_id = %self.id,
            policy = ?failure.policy
        );
        self.failures.push(failure.clone());

        if failure.policy.is_fail_fast() {
            self.abort(failure);
        }
    }

    /// Fail-fast abort: refuse new work and throw away everything queued.
    /// Items already running are left to finish.
    fn abort(&self, cause: WorkFailure) {
        {
            let mut slot = self.abort_slot();
            if slot.is_some() {
                return;
            }
            *slot = Some(cause.clone());
        }

        self.advance(PoolState::ShuttingDown);
        self.queue.close();
        let discarded = self.queue.drain();
        self.discarded.fetch_add(discarded as u64, Ordering::SeqCst);

        warn!(
            scope = %self.scope_key,
            pool_id = %self.id,
            item = %cause.item,
            discarded,
            "fail-fast abort, pool shutting down"
        );
    }

    pub(crate) fn worker_exited(&self) {
        if self.live_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.advance(PoolState::Terminated);
            log_pool!(
                self.scope_key,
                "terminated",
                pool_id = %self.id,
                completed = self.completed.load(Ordering::SeqCst),
                failed = self.failed.load(Ordering::SeqCst),
                discarded = self.discarded.load(Ordering::SeqCst)
            );
        }
    }
}

/// Bounded-queue thread pool with blocking admission and fail-fast aborts.
///
/// Pools are normally obtained through a
/// [`PoolRegistry`](super::PoolRegistry), which tracks which scope owns a
/// pool and which scopes merely borrow it.
///
/// # Behavior
/// - `submit` blocks while the queue is full and the pool is running
/// - `submit` fails with [`PoolError::Unavailable`] once the pool left
///   `Running`, including producers that were blocked at that moment
/// - a failing item submitted with [`FailurePolicy::FailFast`] aborts the
///   pool: admission closes, queued items are discarded, running items finish
/// - a failing item submitted with [`FailurePolicy::Continue`] is logged and
///   the pool carries on
/// - failures never travel back to the submitting thread
///
/// # Worker Thread Behavior
/// 1. Pop the next item from the queue
/// 2. Skip it if the pool was aborted
/// 3. Run it, catching panics
/// 4. Record failures and apply the item's policy
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    config: PoolConfiguration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and start its worker threads.
    ///
    /// # Errors
    /// - [`PoolError::InvalidConfig`] if the configuration does not validate
    /// - [`PoolError::ThreadSpawn`] if a worker thread cannot be started;
    ///   workers already started are shut down again
    pub fn new(config: PoolConfiguration) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(PoolShared {
            id: Uuid::new_v4(),
            scope_key: config.scope_key.clone(),
            queue: WorkQueue::new(config.queue_capacity()),
            state: AtomicUsize::new(PoolState::Running as usize),
            live_workers: AtomicUsize::new(config.thread_count),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            failures: SegQueue::new(),
            abort_cause: Mutex::new(None),
        });

        let pool = Self {
            shared,
            handles: Mutex::new(Vec::with_capacity(config.thread_count)),
            config,
        };
        pool.start_workers()?;

        log_pool!(
            pool.shared.scope_key,
            "started",
            pool_id = %pool.shared.id,
            threads = pool.config.thread_count,
            queue_capacity = pool.shared.queue.capacity()
        );

        Ok(pool)
    }

    fn start_workers(&self) -> Result<(), PoolError> {
        let dispatch = current_subscriber();
        let mut handles = self.handles();

        for worker_id in 0..self.config.thread_count {
            let worker = Worker::new(worker_id, Arc::clone(&self.shared), dispatch.clone());
            let name = format!("{}-{}", self.config.thread_name_prefix, worker_id);

            match worker.spawn(name) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Threads that never started will never report their exit
                    let missing = self.config.thread_count - worker_id;
                    for _ in 0..missing {
                        self.shared.worker_exited();
                    }
                    self.shutdown();
                    return Err(PoolError::ThreadSpawn(err.to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    pub fn scope_key(&self) -> &str {
        &self.shared.scope_key
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    pub fn thread_count(&self) -> usize {
        self.config.thread_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Submit `work` with the pool's default failure policy.
    ///
    /// # Errors
    /// Returns [`PoolError::Unavailable`] if the pool is not running.
    pub fn submit(&self, work: Box<dyn Runnable>) -> Result<(), PoolError> {
        self.submit_with_policy(work, self.config.default_policy())
    }

    /// Submit `work` with an explicit failure policy.
    ///
    /// Blocks while the queue is full. Fails immediately, or as soon as the
    /// pool stops running while blocked, with [`PoolError::Unavailable`].
    ///
    /// `Unavailable` always means the item never runs. An item a worker had
    /// already started when an abort raced with this call is reported as
    /// accepted.
    pub fn submit_with_policy(&self, work: Box<dyn Runnable>, policy: FailurePolicy) -> Result<(), PoolError> {
        if !self.state().is_running() {
            return Err(self.unavailable());
        }

        let claim = Claim::default();
        self.shared
            .queue
            .push(WorkItem {
                work,
                policy,
                claim: claim.clone(),
            })
            .map_err(|_| self.unavailable())?;

        // Enqueued while an abort was under way
        if self.shared.is_aborted() && claim.withdraw() {
            return Err(self.unavailable());
        }
        Ok(())
    }

    /// Submit a named closure with the pool's default failure policy.
    pub fn execute<F>(&self, name: impl Into<String>, work: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> WorkResult + Send + 'static,
    {
        self.submit(runnable(name, work))
    }

    fn unavailable(&self) -> PoolError {
        PoolError::Unavailable {
            scope: self.shared.scope_key.clone(),
        }
    }

    /// Stop admitting work and let queued and running items finish.
    ///
    /// Returns `true` if this call moved the pool out of `Running`.
    /// Does not wait for the workers; see [`WorkerPool::join`].
    pub fn shutdown(&self) -> bool {
        let previous = self.shared.advance(PoolState::ShuttingDown);
        self.shared.queue.close();

        if previous.is_running() {
            log_pool!(
                self.shared.scope_key,
                "shutdown_requested",
                pool_id = %self.shared.id,
                queued = self.shared.queue.len()
            );
            true
        } else {
            false
        }
    }

    /// Block until every worker thread has exited.
    ///
    /// There is no timeout; callers needing one use
    /// [`PoolLease::release_timeout`](super::PoolLease::release_timeout).
    /// When called from one of this pool's own workers, that worker is not
    /// joined.
    ///
    /// # Errors
    /// Returns [`PoolError::Join`] if a worker thread panicked outside of
    /// work-item execution.
    pub fn join(&self) -> Result<(), PoolError> {
        let handles = std::mem::take(&mut *self.handles());
        let current = thread::current().id();
        let mut panicked = 0usize;

        for handle in handles {
            if handle.thread().id() == current {
                warn!(
                    scope = %self.shared.scope_key,
                    "join called from a worker of the same pool, skipping self"
                );
                continue;
            }
            if handle.join().is_err() {
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(PoolError::Join {
                scope: self.shared.scope_key.clone(),
                reason: format!("{} worker thread(s) panicked", panicked),
            });
        }

        debug!(scope = %self.shared.scope_key, "worker threads joined");
        Ok(())
    }

    /// Whether a fail-fast item aborted the pool.
    pub fn is_aborted(&self) -> bool {
        self.shared.is_aborted()
    }

    /// The failure that triggered a fail-fast abort, if any.
    pub fn abort_cause(&self) -> Option<WorkFailure> {
        self.shared.abort_slot().clone()
    }

    /// Fail with [`PoolError::PrematureTermination`] if the pool was aborted.
    pub(crate) fn ensure_not_aborted(&self) -> Result<(), PoolError> {
        match self.abort_cause() {
            Some(cause) => Err(PoolError::PrematureTermination {
                scope: self.shared.scope_key.clone(),
                cause: cause.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Join the workers, then report how the pool ended.
    ///
    /// An abort takes precedence over a join failure; the join failure is
    /// logged in that case.
    pub(crate) fn finish(&self) -> Result<(), PoolError> {
        let joined = self.join();
        if let Err(aborted) = self.ensure_not_aborted() {
            if let Err(join_error) = joined {
                warn!(scope = %self.shared.scope_key, error = %join_error, "aborted pool also failed to join");
            }
            return Err(aborted);
        }
        joined
    }

    /// Remove and return every failure recorded so far, oldest first.
    pub fn take_failures(&self) -> Vec<WorkFailure> {
        let mut failures = Vec::with_capacity(self.shared.failures.len());
        while let Some(failure) = self.shared.failures.pop() {
            failures.push(failure);
        }
        failures
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            pool_id: self.shared.id,
            scope_key: self.shared.scope_key.clone(),
            thread_count: self.config.thread_count,
            queue_capacity: self.shared.queue.capacity(),
            queue_length: self.shared.queue.len(),
            state: self.state(),
            live_workers: self.shared.live_workers.load(Ordering::SeqCst),
            active: self.shared.active.load(Ordering::SeqCst),
            completed: self.shared.completed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            discarded: self.shared.discarded.load(Ordering::SeqCst),
        }
    }

    fn handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("scope_key", &self.shared.scope_key)
            .field("state", &self.state())
            .field("queue", &self.shared.queue)
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers hold the shared state; closing admission lets them exit
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_withdrawn_item_is_discarded_by_worker() {
        let pool = WorkerPool::new(PoolConfiguration::for_scope("claims").with_threads(1)).unwrap();
        let (open, gated) = flume::unbounded::<()>();
        pool.execute("holds-worker", move || {
            gated.recv()?;
            Ok(())
        })
        .unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let claim = Claim::default();
        pool.shared
            .queue
            .push(WorkItem {
                work: runnable("withdrawn", move || {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
                policy: FailurePolicy::Continue,
                claim: claim.clone(),
            })
            .unwrap();
        assert!(claim.withdraw());

        open.send(()).unwrap();
        pool.shutdown();
        pool.join().unwrap();

        assert!(!ran.load(Ordering::SeqCst));
        let metrics = pool.metrics();
        assert_eq!(metrics.discarded, 1);
        assert_eq!(metrics.completed, 1);
    }

    #[test]
    fn test_started_item_cannot_be_withdrawn() {
        let pool = WorkerPool::new(PoolConfiguration::for_scope("claims").with_threads(1)).unwrap();
        let (started_tx, started_rx) = flume::bounded::<()>(1);
        let claim = Claim::default();

        pool.shared
            .queue
            .push(WorkItem {
                work: runnable("runs", move || {
                    started_tx.send(())?;
                    Ok(())
                }),
                policy: FailurePolicy::Continue,
                claim: claim.clone(),
            })
            .unwrap();

        started_rx.recv().unwrap();
        assert!(!claim.withdraw());

        pool.shutdown();
        pool.join().unwrap();
        assert_eq!(pool.metrics().completed, 1);
    }
}
