use memopool_api::{ConstructionError, Factory, FnFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Factory whose values are only thread-safe for short keys
struct LengthAwareFactory {
    calls: AtomicUsize,
}

impl Factory<String, usize> for LengthAwareFactory {
    fn create(&self, key: &String) -> Result<usize, ConstructionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(key.len())
    }

    fn is_thread_safe(&self, _key: &String, value: &usize) -> bool {
        *value < 8
    }
}

#[test]
fn test_fn_factory_defaults_to_thread_safe() {
    let factory = FnFactory::new(|key: &u32| -> Result<u64, ConstructionError> { Ok(*key as u64 * 2) });

    let value = factory.create(&21).unwrap();
    assert_eq!(value, 42);
    assert!(factory.is_thread_safe(&21, &value));
}

#[test]
fn test_fn_factory_not_thread_safe() {
    let factory = FnFactory::new(|key: &u32| -> Result<u32, ConstructionError> { Ok(*key) })
        .not_thread_safe();

    assert!(!factory.is_thread_safe(&1, &1));

    let factory = factory.thread_safe(true);
    assert!(factory.is_thread_safe(&1, &1));
}

#[test]
fn test_fn_factory_propagates_failure() {
    let factory = FnFactory::new(|key: &String| -> Result<String, ConstructionError> {
        Err(ConstructionError::failed(format!("cannot compile {}", key)))
    });

    let err = factory.create(&"x + ".to_string()).unwrap_err();
    assert_eq!(err.to_string(), "Construction failed: cannot compile x + ");
}

#[test]
fn test_factory_through_reference_and_arc() {
    let factory = Arc::new(LengthAwareFactory { calls: AtomicUsize::new(0) });

    let by_ref = &*factory;
    let value = <&LengthAwareFactory as Factory<String, usize>>::create(&by_ref, &"abc".to_string()).unwrap();
    assert_eq!(value, 3);

    let shared: Arc<dyn Factory<String, usize>> = factory.clone();
    let long = "a much longer key".to_string();
    let value = shared.create(&long).unwrap();
    assert!(!shared.is_thread_safe(&long, &value));

    assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
}
