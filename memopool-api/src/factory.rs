//! # Factory Contract
//!
//! A factory builds the value cached under a key and tells the cache whether
//! that value can be shared across threads without external locking.
//!
//! ## Key Concepts
//! - `create` may fail; failures are reported with [`ConstructionError`]
//! - `is_thread_safe` is asked exactly once per published value
//! - Factories are passed explicitly by the caller; there is no runtime
//!   discovery of which factory handles which key

use std::fmt;
use std::sync::Arc;

use crate::errors::ConstructionError;

/// Builds values for keys on behalf of a single-flight cache.
///
/// Implementations are typically supplied by the host runtime, e.g.
/// "compile this script text with this engine" or "parse this document".
///
/// # Examples
///
/// ```rust
/// use memopool_api::{ConstructionError, Factory};
///
/// struct Parser;
///
/// impl Factory<String, Vec<String>> for Parser {
///     fn create(&self, key: &String) -> Result<Vec<String>, ConstructionError> {
///         Ok(key.split(',').map(str::to_string).collect())
///     }
///
///     fn is_thread_safe(&self, _key: &String, _value: &Vec<String>) -> bool {
///         true
///     }
/// }
/// ```
pub trait Factory<K, V>: Send + Sync {
    /// Build the value for `key`.
    ///
    /// # Errors
    /// Returns a [`ConstructionError`] when the value cannot be built. The
    /// error is handed back to the caller unchanged and nothing is cached.
    fn create(&self, key: &K) -> Result<V, ConstructionError>;

    /// Report whether `value` may be used by several threads at once.
    fn is_thread_safe(&self, key: &K, value: &V) -> bool;
}

impl<K, V, F> Factory<K, V> for &F
where
    F: Factory<K, V> + ?Sized,
{
    fn create(&self, key: &K) -> Result<V, ConstructionError> {
        (**self).create(key)
    }

    fn is_thread_safe(&self, key: &K, value: &V) -> bool {
        (**self).is_thread_safe(key, value)
    }
}

impl<K, V, F> Factory<K, V> for Arc<F>
where
    F: Factory<K, V> + ?Sized,
{
    fn create(&self, key: &K) -> Result<V, ConstructionError> {
        (**self).create(key)
    }

    fn is_thread_safe(&self, key: &K, value: &V) -> bool {
        (**self).is_thread_safe(key, value)
    }
}

/// Factory built from a closure with a fixed thread-safety answer.
///
/// Values are reported as thread-safe unless [`FnFactory::not_thread_safe`]
/// is called.
#[derive(Clone)]
pub struct FnFactory<C> {
    create: C,
    thread_safe: bool,
}

impl<C> FnFactory<C> {
    /// Wrap `create` in a factory whose values are thread-safe.
    pub fn new(create: C) -> Self {
        Self {
            create,
            thread_safe: true,
        }
    }

    /// Mark every value built by this factory as requiring external locking.
    pub fn not_thread_safe(mut self) -> Self {
        self.thread_safe = false;
        self
    }

    /// Set the thread-safety answer explicitly.
    pub fn thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = thread_safe;
        self
    }
}

impl<C> fmt::Debug for FnFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("thread_safe", &self.thread_safe)
            .finish()
    }
}

impl<K, V, C> Factory<K, V> for FnFactory<C>
where
    C: Fn(&K) -> Result<V, ConstructionError> + Send + Sync,
{
    fn create(&self, key: &K) -> Result<V, ConstructionError> {
        (self.create)(key)
    }

    fn is_thread_safe(&self, _key: &K, _value: &V) -> bool {
        self.thread_safe
    }
}
