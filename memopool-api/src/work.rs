//! # Unit-of-Work Contract
//!
//! Work submitted to a worker pool implements [`Runnable`]. Closures can be
//! wrapped with [`runnable`].
//!
//! A work item reports failure by returning an error. The pool decides what
//! to do with the failure according to the item's
//! [`FailurePolicy`](crate::FailurePolicy); the error never travels back to
//! the thread that submitted the item.

use std::fmt;

/// Outcome of running a work item.
pub type WorkResult = anyhow::Result<()>;

/// A unit of work executed once on a pool worker thread.
pub trait Runnable: Send + 'static {
    /// Run the work, consuming it.
    fn run(self: Box<Self>) -> WorkResult;

    /// Human-readable name used in logs and failure records.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// [`Runnable`] built from a named closure.
pub struct FnRunnable<F> {
    name: String,
    work: F,
}

impl<F> FnRunnable<F>
where
    F: FnOnce() -> WorkResult + Send + 'static,
{
    pub fn new(name: impl Into<String>, work: F) -> Self {
        Self {
            name: name.into(),
            work,
        }
    }
}

impl<F> fmt::Debug for FnRunnable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRunnable")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> Runnable for FnRunnable<F>
where
    F: FnOnce() -> WorkResult + Send + 'static,
{
    fn run(self: Box<Self>) -> WorkResult {
        let this = *self;
        (this.work)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a boxed [`Runnable`].
///
/// # Examples
///
/// ```rust
/// use memopool_api::runnable;
///
/// let work = runnable("say-hello", || {
///     println!("hello");
///     Ok(())
/// });
/// assert_eq!(work.name(), "say-hello");
/// ```
pub fn runnable<F>(name: impl Into<String>, work: F) -> Box<dyn Runnable>
where
    F: FnOnce() -> WorkResult + Send + 'static,
{
    Box::new(FnRunnable::new(name, work))
}
