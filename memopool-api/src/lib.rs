//! # Memopool API
//!
//! Memopool is a small in-process core that host runtimes use for two things:
//! memoizing expensive constructions (compiled scripts, parsed documents,
//! compiled sub-programs) and running units of work on a bounded pool of
//! worker threads.
//!
//! This crate only holds the contracts. The implementation lives in the
//! `memopool` crate; hosts that merely supply factories or work items can
//! depend on this crate alone.
//!
//! ## Core Components
//!
//! - **Factory**: knows how to build a value for a key and whether the built
//!   value may be shared across threads without external locking
//! - **Runnable**: a unit of work submitted to a worker pool
//! - **Errors**: the construction error surfaced by factories
//! - **Types**: pool states, failure policies and cache scopes
//!
//! ## Usage Example
//!
//! ```rust
//! use memopool_api::{ConstructionError, Factory, FnFactory};
//!
//! // A factory that "compiles" a script by upper-casing it
//! let compile = FnFactory::new(|script: &String| -> Result<String, ConstructionError> {
//!     if script.is_empty() {
//!         return Err(ConstructionError::failed("empty script"));
//!     }
//!     Ok(script.to_uppercase())
//! });
//!
//! let key = "print('hi')".to_string();
//! let compiled = compile.create(&key).unwrap();
//! assert!(compile.is_thread_safe(&key, &compiled));
//! ```
//!
//! ## Module Organization
//!
//! - [`factory`]: value construction contract
//! - [`work`]: unit-of-work contract
//! - [`errors`]: error types
//! - [`types`]: shared enums

pub mod errors;
pub mod factory;
pub mod types;
pub mod work;

pub use errors::ConstructionError;
pub use factory::{Factory, FnFactory};
pub use types::{CacheScope, FailurePolicy, PoolState};
pub use work::{runnable, FnRunnable, Runnable, WorkResult};
