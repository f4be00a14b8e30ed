// Async release with a caller-supplied deadline

use std::sync::Arc;
use std::time::Duration;

use memopool::{PoolConfiguration, PoolError, PoolRegistry};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_release_timeout_waits_for_drain() {
    let registry = Arc::new(PoolRegistry::new());
    let lease = registry
        .acquire(&PoolConfiguration::for_scope("async-drain").with_threads(2))
        .unwrap();

    for i in 0..4 {
        lease
            .execute(format!("short-{}", i), || {
                std::thread::sleep(Duration::from_millis(10));
                Ok(())
            })
            .unwrap();
    }

    lease.release_timeout(Duration::from_secs(5)).await.unwrap();
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_release_timeout_reports_slow_drain() {
    let registry = Arc::new(PoolRegistry::new());
    let lease = registry
        .acquire(&PoolConfiguration::for_scope("async-slow").with_threads(1))
        .unwrap();
    let pool = lease.pool().clone();

    lease
        .execute("slow", || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .unwrap();

    let err = lease.release_timeout(Duration::from_millis(50)).await.unwrap_err();
    assert_eq!(
        err,
        PoolError::DrainTimeout {
            scope: "async-slow".to_string(),
            after: Duration::from_millis(50),
        }
    );

    // Workers keep draining in the background
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(pool.metrics().completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_release_timeout_on_borrowed_lease_is_noop() {
    let registry = Arc::new(PoolRegistry::new());
    let owner = registry
        .acquire(&PoolConfiguration::for_scope("async-borrow").with_threads(1))
        .unwrap();
    let borrowed = registry
        .acquire(&PoolConfiguration::for_scope("async-borrow").with_threads(1))
        .unwrap();

    borrowed.release_timeout(Duration::from_millis(10)).await.unwrap();
    assert!(owner.state().is_running());
    owner.release_timeout(Duration::from_secs(5)).await.unwrap();
}
