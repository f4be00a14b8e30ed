// Logging for Memopool
//
// Events are emitted under two targets that can be tuned independently:
//
// - `memopool::pool`: pool lifecycle, worker threads, work-item failures,
//   fail-fast aborts
// - `memopool::cache`: cache registration, constructions, clears
//
// ```rust
// use memopool::logging::{self, LogConfig};
// use tracing::Level;
//
// // Lifecycle at INFO, construction details from the caches at DEBUG
// let config = LogConfig {
//     cache_level: Some(Level::DEBUG),
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Worker threads inherit the dispatcher that was current when their pool
// was created, so a subscriber installed with `set_default` in a test also
// sees the events emitted by workers.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

pub const POOL_TARGET: &str = "memopool::pool";
pub const CACHE_TARGET: &str = "memopool::cache";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for everything without a more specific directive
    pub level: Level,
    /// Level for `memopool::pool`
    pub pool_level: Option<Level>,
    /// Level for `memopool::cache`
    pub cache_level: Option<Level>,
    /// JSON lines instead of human-readable output
    pub json_format: bool,
    /// Include worker thread names
    pub show_thread_info: bool,
    pub show_time: bool,
    /// Extra directives, e.g. `"my_host=debug,memopool::pool::worker=trace"`
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            pool_level: None,
            cache_level: None,
            json_format: false,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

impl LogConfig {
    /// Every cache construction and every worker start and exit.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            pool_level: Some(Level::TRACE),
            cache_level: Some(Level::DEBUG),
            ..Default::default()
        }
    }

    /// JSON lines with pool lifecycle; cache chatter is dropped.
    pub fn production() -> Self {
        Self {
            json_format: true,
            cache_level: Some(Level::WARN),
            ..Default::default()
        }
    }

    /// Failures only: work-item errors, fail-fast aborts, drain timeouts,
    /// and leases dropped without release.
    pub fn failures_only() -> Self {
        Self {
            level: Level::WARN,
            show_thread_info: false,
            ..Default::default()
        }
    }

    /// Filter directives in the order they are applied; later ones win
    /// for the same target.
    pub fn directives(&self) -> Vec<String> {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        if let Some(level) = self.pool_level {
            directives.push(format!("{}={}", POOL_TARGET, level.to_string().to_lowercase()));
        }
        if let Some(level) = self.cache_level {
            directives.push(format!("{}={}", CACHE_TARGET, level.to_string().to_lowercase()));
        }
        if let Some(filters) = &self.target_filters {
            directives.extend(
                filters
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        }
        directives
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG first so the configuration can narrow it per target
        self.directives()
            .iter()
            .filter_map(|directive| directive.parse().ok())
            .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
    }

    fn console_layer(&self) -> BoxedLayer {
        if self.json_format {
            return fmt::layer()
                .json()
                .flatten_event(true)
                .with_thread_names(self.show_thread_info)
                .boxed();
        }

        let layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_thread_names(self.show_thread_info);
        if self.show_time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }
}

/// Install `layers` behind the configuration's filter as the global
/// subscriber. Returns `false` if one was already installed.
fn install(config: &LogConfig, layers: Vec<BoxedLayer>) -> bool {
    tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter())
        .try_init()
        .is_ok()
}

/// Install the global subscriber for `config`.
///
/// Returns `true` if this call installed it; later calls leave the first
/// subscriber in place and return `false`.
pub fn init(config: LogConfig) -> bool {
    install(&config, vec![config.console_layer()])
}

/// Like [`init`], additionally appending plain-text output to `path`.
///
/// # Errors
/// Returns an error if the file cannot be opened; nothing is installed then.
pub fn init_with_file(config: LogConfig, path: impl AsRef<Path>) -> io::Result<bool> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(Mutex::new(file))
        .boxed();

    Ok(install(&config, vec![config.console_layer(), file_layer]))
}

/// Initialize logging for tests: [`LogConfig::failures_only`] without
/// timestamps. Safe to call from every test.
pub fn init_test() {
    init(LogConfig {
        show_time: false,
        ..LogConfig::failures_only()
    });
}

/// Create a span covering the work done on behalf of one pool
#[macro_export]
macro_rules! pool_span {
    ($scope:expr) => {
        $crate::logging::info_span!("pool", scope = %$scope)
    };
    ($scope:expr, $($fields:tt)*) => {
        $crate::logging::info_span!("pool", scope = %$scope, $($fields)*)
    };
}

/// Log pool lifecycle events (creation, shutdown, abort, termination)
#[macro_export]
macro_rules! log_pool {
    ($scope:expr, $event:expr) => {
        $crate::logging::info!(scope = %$scope, event = $event)
    };
    ($scope:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::info!(scope = %$scope, event = $event, $($fields)*)
    };
}

/// Log cache events - use for detailed construction tracing
#[macro_export]
macro_rules! log_cache {
    ($cache:expr, $event:expr) => {
        $crate::logging::debug!(cache = %$cache, event = $event)
    };
    ($cache:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::debug!(cache = %$cache, event = $event, $($fields)*)
    };
}

/// Log error events - use for all error conditions
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        $crate::logging::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        $crate::logging::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Useful when spawning threads that need access to the current tracing
/// configuration.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, info_span, trace, warn};
