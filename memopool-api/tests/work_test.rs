use memopool_api::{runnable, FnRunnable, Runnable, WorkResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct NamedJob {
    ran: Arc<AtomicBool>,
}

impl Runnable for NamedJob {
    fn run(self: Box<Self>) -> WorkResult {
        self.ran.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "named-job"
    }
}

#[test]
fn test_runnable_closure_runs_once() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let work = runnable("flip", move || {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(work.name(), "flip");
    work.run().unwrap();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_runnable_error_is_returned() {
    let work = FnRunnable::new("broken", || anyhow::bail!("precondition failed"));
    let err = Box::new(work).run().unwrap_err();
    assert_eq!(err.to_string(), "precondition failed");
}

#[test]
fn test_custom_runnable_and_default_name() {
    struct Silent;
    impl Runnable for Silent {
        fn run(self: Box<Self>) -> WorkResult {
            Ok(())
        }
    }

    let ran = Arc::new(AtomicBool::new(false));
    let job: Box<dyn Runnable> = Box::new(NamedJob { ran: ran.clone() });
    assert_eq!(job.name(), "named-job");
    job.run().unwrap();
    assert!(ran.load(Ordering::SeqCst));

    let silent: Box<dyn Runnable> = Box::new(Silent);
    assert_eq!(silent.name(), "anonymous");
}
