// Integration tests for pool ownership across nested scopes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use memopool::{PoolConfiguration, PoolError, PoolRegistry, PoolState};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;

fn config(scope: &str) -> PoolConfiguration {
    PoolConfiguration::for_scope(scope).with_threads(2).with_queue_ratio(2)
}

#[test]
fn test_first_acquire_owns_nested_acquire_borrows() {
    let registry = Arc::new(PoolRegistry::new());

    let outer = registry.acquire(&config("build")).unwrap();
    assert!(outer.is_owned());
    assert_eq!(registry.len(), 1);

    let inner = registry.acquire(&config("build")).unwrap();
    assert!(!inner.is_owned());
    assert_eq!(inner.id(), outer.id());

    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();
    inner
        .execute("nested", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    // Releasing a borrowed pool leaves it running
    inner.release().unwrap();
    assert_eq!(outer.state(), PoolState::Running);
    assert!(registry.lookup("build").is_some());

    let pool = outer.pool().clone();
    outer.release().unwrap();
    assert_eq!(pool.state(), PoolState::Terminated);
    assert!(registry.is_empty());
    assert_eq!(executed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reuse_disabled_creates_separate_owned_pool() {
    let registry = Arc::new(PoolRegistry::new());

    let outer = registry.acquire(&config("render")).unwrap();
    let private = registry
        .acquire(&config("render").with_reuse_existing(false))
        .unwrap();

    assert!(private.is_owned());
    assert_ne!(private.id(), outer.id());
    // The registered pool is still the outer one
    assert_eq!(registry.lookup("render").unwrap().id(), outer.id());

    private.release().unwrap();
    assert_eq!(registry.lookup("render").unwrap().id(), outer.id());
    outer.release().unwrap();
    assert!(registry.lookup("render").is_none());
}

#[test]
fn test_different_scopes_get_different_pools() {
    let registry = Arc::new(PoolRegistry::new());
    let a = registry.acquire(&config("a")).unwrap();
    let b = registry.acquire(&config("b")).unwrap();

    assert!(a.is_owned() && b.is_owned());
    assert_ne!(a.id(), b.id());
    assert_eq!(registry.len(), 2);

    a.release().unwrap();
    b.release().unwrap();
}

#[test]
fn test_lend_hands_out_borrowed_lease() {
    let registry = Arc::new(PoolRegistry::new());
    let owner = registry.acquire(&config("lend")).unwrap();

    let borrowed = owner.lend();
    assert!(!borrowed.is_owned());
    assert_eq!(borrowed.id(), owner.id());

    let handle = thread::spawn(move || {
        borrowed.execute("from-child", || Ok(())).unwrap();
        borrowed.release()
    });
    handle.join().unwrap().unwrap();

    owner.release().unwrap();
}

#[test]
fn test_aborted_pool_is_not_lent_to_new_scopes() {
    let registry = Arc::new(PoolRegistry::new());
    let owner = registry
        .acquire(&config("etl").with_fail_fast(true))
        .unwrap();

    owner.execute("extract", || anyhow::bail!("source missing")).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !owner.is_aborted() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(owner.is_aborted());

    let next = registry.acquire(&config("etl")).unwrap();
    assert!(next.is_owned());
    assert_ne!(next.id(), owner.id());
    assert_eq!(registry.lookup("etl").unwrap().id(), next.id());

    assert!(matches!(
        owner.release(),
        Err(PoolError::PrematureTermination { .. })
    ));
    // The aborted owner must not unregister its replacement
    assert_eq!(registry.lookup("etl").unwrap().id(), next.id());
    next.release().unwrap();
}

#[test]
fn test_dropping_owned_lease_shuts_pool_down() {
    let registry = Arc::new(PoolRegistry::new());
    let lease = registry.acquire(&config("forgotten")).unwrap();
    let pool = lease.pool().clone();

    drop(lease);

    assert_ne!(pool.state(), PoolState::Running);
    assert!(registry.is_empty());
    pool.join().unwrap();
    assert_eq!(pool.state(), PoolState::Terminated);
}

#[test]
fn test_acquire_rejects_invalid_configuration() {
    let registry = Arc::new(PoolRegistry::new());
    let err = registry
        .acquire(&PoolConfiguration::for_scope("  "))
        .unwrap_err();
    assert_eq!(err, PoolError::InvalidConfig("scope_key must not be empty".to_string()));
    assert!(registry.is_empty());
}

/// Subscriber layer that panics on the worker's exit event, killing the
/// worker thread outside of work-item execution
struct PanicOnWorkerExit;

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for PanicOnWorkerExit {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        if message == "worker exiting" {
            panic!("subscriber failed during worker exit");
        }
    }
}

#[test]
fn test_abort_is_reported_even_when_a_worker_dies() {
    let registry = Arc::new(PoolRegistry::new());
    let dispatch = tracing::Dispatch::new(tracing_subscriber::registry().with(PanicOnWorkerExit));

    // Workers inherit the dispatcher current at creation
    let lease = tracing::dispatcher::with_default(&dispatch, || {
        registry
            .acquire(&config("doomed").with_threads(1).with_fail_fast(true))
            .unwrap()
    });
    lease.execute("breaks", || anyhow::bail!("bad input")).unwrap();

    match lease.release() {
        Err(PoolError::PrematureTermination { scope, cause }) => {
            assert_eq!(scope, "doomed");
            assert!(cause.contains("bad input"), "cause: {}", cause);
        }
        other => panic!("unexpected release result: {:?}", other),
    }
}
