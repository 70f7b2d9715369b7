//! Logger builder implementation
//!
//! `format` holds the layer construction macros so each format/writer
//! combination is written once.

#[macro_use]
mod format;

// External dependencies
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

// Internal crates
use crate::config::{Config, Format, Writer};
use crate::{LogError, LogResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Borrow the configuration the builder will install
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the filter without installing anything
    ///
    /// Exposed so callers can validate a directive before committing to it.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::filter(self.config.level.as_str(), e))
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<()> {
        let filter = self.filter()?;
        let display = &self.config.display;
        let writer = self.config.writer;

        let fmt_layer: BoxedLayer = match self.config.format {
            Format::Pretty => finish_layer!(create_fmt_layer!(pretty, display), display, writer),
            Format::Compact => finish_layer!(create_fmt_layer!(compact, display), display, writer),
            Format::Json => finish_layer!(create_json_layer!(display), display, writer),
        };

        Registry::default()
            .with(fmt_layer)
            .with(filter)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))
    }
}
