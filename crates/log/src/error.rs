//! Error types for logger setup

use thiserror::Error;

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while installing a subscriber
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogError {
    /// The level directive could not be parsed
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// The directive as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("logger initialization failed: {0}")]
    Init(String),

    /// An unknown value was given for a configuration option
    #[error("configuration error: {0}")]
    Config(String),
}

impl LogError {
    /// Create a filter parsing error
    pub fn filter(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::Filter {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_error_mentions_directive() {
        let err = LogError::filter("ambit=loud", "invalid level");
        assert_eq!(
            err.to_string(),
            "invalid filter 'ambit=loud': invalid level"
        );
    }
}
