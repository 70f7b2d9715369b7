//! # Ambit Log
//!
//! Logging setup shared by the ambit crates.
//!
//! Library code only emits events through the re-exported `tracing` macros.
//! Binaries, tests and benches pick a subscriber once at startup:
//!
//! ```rust,no_run
//! use ambit_log::prelude::*;
//!
//! fn main() -> LogResult<()> {
//!     ambit_log::auto_init()?;
//!
//!     info!(capacity = 4096, "stack allocator ready");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;
mod macros;

// Public API
pub use builder::LoggerBuilder;
pub use config::{Config, DisplayConfig, Format, Level, Writer};
pub use error::{LogError, LogResult};

// Re-export tracing macros
pub use tracing::{debug, error, info, span, trace, warn};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Config, Format, Level, LogError, LogResult, auto_init, debug, error, info, init, init_with,
        trace, warn,
    };
}

// ============================================================================
// Initialization Functions
// ============================================================================

/// Pick a configuration from the environment and install it
///
/// `AMBIT_LOG` or `RUST_LOG` select [`Config::from_env`]. Otherwise debug builds
/// get [`Config::development`] and release builds [`Config::production`].
pub fn auto_init() -> LogResult<()> {
    if std::env::var("AMBIT_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<()> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<()> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests
///
/// Output goes through libtest's capture. Safe to call from every test: once a
/// global subscriber exists the call does nothing.
pub fn init_test() -> LogResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }
    match init_with(Config::test()) {
        // another test thread won the race
        Err(LogError::Init(_)) if tracing::dispatcher::has_been_set() => Ok(()),
        other => other,
    }
}
