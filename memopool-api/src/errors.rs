//! # Construction Error Types
//!
//! Errors a [`Factory`](crate::Factory) reports when it cannot build a value.
//!
//! ## Design Philosophy
//!
//! - Construction failures are never cached: every caller that triggers a
//!   construction sees its own error and the next caller retries
//! - The cache forwards these errors unchanged; it never wraps them
//! - Arbitrary library errors are carried through `anyhow`

use thiserror::Error;

/// Error returned by a factory that failed to build a value for a key.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// The factory rejected the key or failed with a plain message.
    #[error("Construction failed: {0}")]
    Failed(String),

    /// The factory failed because an underlying library call failed.
    #[error("Construction failed: {0:#}")]
    Source(#[from] anyhow::Error),
}

impl ConstructionError {
    /// Shorthand for [`ConstructionError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        ConstructionError::Failed(message.into())
    }
}
