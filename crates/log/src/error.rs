use thiserror::Error;

/// Logger setup errors
#[derive(Debug, Error)]
pub enum LogError {
    /// Filter directives could not be parsed.
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// Directives as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),

    /// A configuration value is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;
