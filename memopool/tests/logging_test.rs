// Logging setup tests

use std::time::Duration;

use memopool::logging::{self, LogConfig};
use memopool::{log_cache, log_error, log_pool, pool_span, PoolConfiguration, PoolRegistry};
use tracing::Level;

#[test]
fn test_only_the_first_init_installs() {
    logging::init_test();
    // A global subscriber exists now, whichever test installed it
    assert!(!logging::init(LogConfig::development()));
    assert!(!logging::init(LogConfig::production()));

    let unused = std::env::temp_dir().join(format!("memopool-{}.log", uuid::Uuid::new_v4()));
    assert!(!logging::init_with_file(LogConfig::default(), &unused).unwrap());
    std::fs::remove_file(&unused).ok();
}

#[test]
fn test_presets_tune_pool_and_cache_targets() {
    assert_eq!(LogConfig::default().directives(), vec!["info"]);
    assert_eq!(
        LogConfig::development().directives(),
        vec!["debug", "memopool::pool=trace", "memopool::cache=debug"]
    );

    let production = LogConfig::production();
    assert!(production.json_format);
    assert_eq!(production.directives(), vec!["info", "memopool::cache=warn"]);

    let quiet = LogConfig::failures_only();
    assert_eq!(quiet.level, Level::WARN);
    assert_eq!(quiet.directives(), vec!["warn"]);
}

#[test]
fn test_target_filters_are_appended_last() {
    let config = LogConfig {
        pool_level: Some(Level::DEBUG),
        target_filters: Some("my_host=trace, ,memopool::pool::worker=trace".to_string()),
        ..Default::default()
    };
    assert_eq!(
        config.directives(),
        vec!["info", "memopool::pool=debug", "my_host=trace", "memopool::pool::worker=trace"]
    );
}

#[test]
fn test_macros_expand_outside_the_crate() {
    logging::init_test();

    let span = pool_span!("scripts", pool_id = "abc");
    let _guard = span.enter();
    log_pool!("scripts", "started", threads = 2);
    log_cache!("compiled", "hit");
    log_error!("boom", scope = "scripts");
}

#[test]
fn test_workers_inherit_the_creating_dispatcher() {
    let dispatch = tracing::Dispatch::new(tracing_subscriber::registry());

    tracing::dispatcher::with_default(&dispatch, || {
        let registry = std::sync::Arc::new(PoolRegistry::new());
        let lease = registry
            .acquire(&PoolConfiguration::for_scope("traced").with_threads(1))
            .unwrap();
        lease
            .execute("traced-item", || {
                let inherited =
                    tracing::dispatcher::get_default(|current| current.is::<tracing_subscriber::Registry>());
                anyhow::ensure!(inherited, "worker is not using the creating dispatcher");
                std::thread::sleep(Duration::from_millis(1));
                Ok(())
            })
            .unwrap();
        let pool = lease.pool().clone();
        lease.release().unwrap();
        assert!(pool.take_failures().is_empty());
    });
}
