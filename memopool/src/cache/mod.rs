//! # Single-Flight Cache Module
//!
//! Memoizes expensive constructions (compiled scripts, parsed documents,
//! compiled sub-programs) keyed by caller-supplied keys.
//!
//! ## Key Concepts
//! - Single flight: at most one construction per key is in flight
//! - No negative caching: failed constructions are retried by the next caller
//! - Thread-safety reporting: each entry records, once, whether its value may
//!   be used concurrently; callers serialize access to values that may not
//!
//! ## Lifetime
//! Caches have no eviction or TTL. A cache lives as long as the scope that
//! owns it: the root execution context for process-wide caches, a child
//! context for request-scoped ones.

mod entry;
mod registry;
mod single_flight;

pub use entry::CacheEntry;
pub use single_flight::{CacheStats, SingleFlightCache};

pub(crate) use registry::CacheRegistry;
