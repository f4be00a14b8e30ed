use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use flume::{Receiver, Selector, Sender, TrySendError};

use memopool_api::{FailurePolicy, Runnable};

/// A unit of work plus the failure policy in effect when it was submitted.
pub(crate) struct WorkItem {
    pub(crate) work: Box<dyn Runnable>,
    pub(crate) policy: FailurePolicy,
    pub(crate) claim: Claim,
}

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const WITHDRAWN: u8 = 2;

/// Decides, exactly once, whether a queued item runs.
///
/// A worker starts the item or its submitter withdraws it, whichever comes
/// first; the loser of the race backs off.
#[derive(Clone, Debug, Default)]
pub(crate) struct Claim(Arc<AtomicU8>);

impl Claim {
    /// Claim the item for execution. `false` if it was withdrawn.
    pub(crate) fn start(&self) -> bool {
        self.settle(STARTED)
    }

    /// Take the item back. `false` if a worker already started it.
    pub(crate) fn withdraw(&self) -> bool {
        self.settle(WITHDRAWN)
    }

    fn settle(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("name", &self.work.name())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Returned by [`WorkQueue::push`] once admission has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueClosed;

/// Senders held while the queue admits work. Dropping them closes admission.
struct Admission {
    sender: Sender<WorkItem>,
    _close_signal: Sender<()>,
}

/// Bounded FIFO of pending work items with blocking admission.
///
/// # Behavior
/// - `push` blocks while the queue is full and admission is open
/// - closing admission wakes every blocked `push`, which then fails
/// - `pop` keeps returning queued items after admission closes and returns
///   `None` once the queue is empty and no producer is left
pub(crate) struct WorkQueue {
    capacity: usize,
    receiver: Receiver<WorkItem>,
    /// Disconnects when admission closes; blocked producers select on it.
    closed: Receiver<()>,
    admission: Mutex<Option<Admission>>,
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WorkQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        let (close_signal, closed) = flume::bounded(1);

        Self {
            capacity,
            receiver,
            closed,
            admission: Mutex::new(Some(Admission {
                sender,
                _close_signal: close_signal,
            })),
        }
    }

    /// Enqueue `item`, blocking while the queue is full.
    ///
    /// # Errors
    /// Returns [`QueueClosed`] if admission is closed before or while the
    /// caller waits for space. The item is dropped in that case.
    pub(crate) fn push(&self, item: WorkItem) -> Result<(), QueueClosed> {
        let sender = match self.admission().as_ref() {
            Some(admission) => admission.sender.clone(),
            None => return Err(QueueClosed),
        };

        let item = match sender.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(_)) => return Err(QueueClosed),
        };

        // Full: wait for a free slot or for admission to close
        Selector::new()
            .send(&sender, item, |sent| sent.map_err(|_| QueueClosed))
            .recv(&self.closed, |_| Err(QueueClosed))
            .wait()
    }

    /// Take the next item, blocking until one is available.
    pub(crate) fn pop(&self) -> Option<WorkItem> {
        self.receiver.recv().ok()
    }

    /// Stop admitting work. Returns `true` if this call closed admission.
    pub(crate) fn close(&self) -> bool {
        self.admission().take().is_some()
    }

    /// Remove every queued item without running it. Returns how many were
    /// removed.
    pub(crate) fn drain(&self) -> usize {
        self.receiver.drain().count()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.admission().is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn admission(&self) -> MutexGuard<'_, Option<Admission>> {
        self.admission.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
