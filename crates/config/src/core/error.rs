//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read
    #[error("failed to load {origin}: {message}")]
    SourceError {
        /// What went wrong
        message: String,
        /// The source description
        origin: String,
    },

    /// A source was read but could not be parsed
    #[error("failed to parse {origin}: {message}")]
    ParseError {
        /// Parser message
        message: String,
        /// The source description
        origin: String,
    },

    /// The file extension maps to no known format
    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// No value exists at the requested path
    #[error("configuration path not found: {path}")]
    PathNotFound {
        /// The colon-separated path
        path: String,
    },

    /// The value at a path has the wrong shape for the requested type
    #[error("type error: expected {expected}, found {actual}: {message}")]
    TypeError {
        /// Deserializer message
        message: String,
        /// The requested type
        expected: String,
        /// What was there instead
        actual: String,
    },
}

impl ConfigError {
    /// Create a source error
    pub fn source_error(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::SourceError {
            message: message.into(),
            origin: origin.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            origin: origin.into(),
        }
    }

    /// Create a type error
    pub fn type_error(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeError {
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a path-not-found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }
}

/// Standard result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_not_found_display() {
        let err = ConfigError::path_not_found("Parameters:db-password");
        assert_eq!(
            err.to_string(),
            "configuration path not found: Parameters:db-password"
        );
    }

    #[test]
    fn source_error_display() {
        let err = ConfigError::source_error("no such file", "file: app.toml");
        assert_eq!(err.to_string(), "failed to load file: app.toml: no such file");
    }
}
