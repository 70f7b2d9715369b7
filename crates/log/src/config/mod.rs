//! Configuration types
//!
//! - `Config`: filter directive, output format, writer and display options
//! - `presets`: development, production, test and environment-driven setups

mod presets;

use std::fmt;
use std::str::FromStr;

use crate::LogError;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log level filter (e.g., "info", "debug,ambit_memory=trace")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output destination
    pub writer: Writer,

    /// Display configuration
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Level::Info.to_string(),
            format: Format::Compact,
            writer: Writer::Stderr,
            display: DisplayConfig::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable with colors and indentation
    Pretty,
    /// Compact single-line output
    Compact,
    /// Structured JSON output
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LogError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Where formatted events go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    /// Standard error
    Stderr,
    /// Standard output
    Stdout,
    /// libtest's captured output
    Test,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Trace => write!(f, "trace"),
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warn => write!(f, "warn"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// Which metadata is printed next to each event
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DisplayConfig {
    /// ANSI colors
    pub colors: bool,
    /// Timestamps
    pub time: bool,
    /// Event target (module path)
    pub target: bool,
    /// File and line
    pub source: bool,
    /// Thread ids
    pub thread_ids: bool,
    /// Thread names
    pub thread_names: bool,
    /// Flatten event fields into the JSON root object
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: cfg!(feature = "ansi"),
            time: true,
            target: true,
            source: false,
            thread_ids: false,
            thread_names: false,
            flatten: false,
        }
    }
}

impl DisplayConfig {
    /// Apply `AMBIT_LOG_COLORS`, `AMBIT_LOG_TIME` and `AMBIT_LOG_SOURCE` overrides
    pub(crate) fn parse_env(&mut self) {
        fn flag(name: &str) -> Option<bool> {
            std::env::var(name)
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        }

        if let Some(colors) = flag("AMBIT_LOG_COLORS") {
            self.colors = colors;
        }
        if let Some(time) = flag("AMBIT_LOG_TIME") {
            self.time = time;
        }
        if let Some(source) = flag("AMBIT_LOG_SOURCE") {
            self.source = source;
        }
    }
}
