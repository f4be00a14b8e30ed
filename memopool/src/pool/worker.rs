//! # Worker Thread
//!
//! Each worker pulls items from the pool's queue and runs them until the
//! queue is closed and empty.
//!
//! ## Responsibilities
//! - Run work items, catching panics so one item cannot take a thread down
//! - Hand failures to the pool, which applies the item's failure policy
//! - Skip items that were still queued when a fail-fast abort happened
//! - Report its own exit so the pool can reach `Terminated`

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, Dispatch};

use crate::pool_span;

use super::pool::{PoolShared, WorkFailure};
use super::queue::WorkItem;

pub(crate) struct Worker {
    id: usize,
    shared: Arc<PoolShared>,
    /// Dispatcher that was current when the pool was created
    dispatch: Dispatch,
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<PoolShared>, dispatch: Dispatch) -> Self {
        Self { id, shared, dispatch }
    }

    /// Start the worker on a new named OS thread.
    pub(crate) fn spawn(self, thread_name: String) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || self.run())
    }

    fn run(self) {
        let _dispatch = tracing::dispatcher::set_default(&self.dispatch);
        let span = pool_span!(self.shared.scope_key, pool_id = %self.shared.id, worker = self.id);
        let _entered = span.enter();

        trace!("worker started");

        while let Some(item) = self.shared.queue.pop() {
            // Items still queued at an abort, or withdrawn by a submitter
            // that saw the abort, never run
            if self.shared.is_aborted() || !item.claim.start() {
                self.shared.discarded.fetch_add(1, Ordering::SeqCst);
                debug!(item = item.work.name(), "discarding work queued before abort");
                continue;
            }
            self.execute(item);
        }

        trace!("worker exiting");
        self.shared.worker_exited();
    }

    fn execute(&self, item: WorkItem) {
        let WorkItem { work, policy, .. } = item;
        let name = work.name().to_string();

        self.shared.active.fetch_add(1, Ordering::SeqCst);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || work.run()));
        self.shared.active.fetch_sub(1, Ordering::SeqCst);

        let message = match outcome {
            Ok(Ok(())) => {
                self.shared.completed.fetch_add(1, Ordering::SeqCst);
                return;
            }
            Ok(Err(err)) => format!("{:#}", err),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        self.shared.record_failure(WorkFailure {
            item: name,
            message,
            policy,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
