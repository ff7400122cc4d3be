//! Logging error types.

use thiserror::Error;

/// Result alias for logger setup.
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while configuring or installing the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The filter directive string could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed for this process.
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_display() {
        let err = LogError::Filter("=: bad directive".into());
        assert_eq!(err.to_string(), "invalid log filter: =: bad directive");
    }
}
