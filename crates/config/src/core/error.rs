//! Configuration error types

use thiserror::Error;

/// Boxed cause carried by conversion and loader errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration error type
///
/// Only definition errors and conversion errors are meant to reach callers.
/// Source errors are produced by loaders and absorbed by the load engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The declaration itself is malformed
    #[error("Invalid configuration definition: {message}")]
    Definition {
        /// Error message describing the definition problem
        message: String,
    },

    /// A source locator could not be parsed into a well-formed URI
    #[error("Unsupported source locator '{locator}': {message}")]
    InvalidLocator {
        /// Locator after variable expansion
        locator: String,
        /// Parse failure description
        message: String,
    },

    /// A source could not be read
    #[error("Source unavailable: {locator}: {message}")]
    SourceUnavailable {
        /// Locator of the source
        locator: String,
        /// Error message
        message: String,
    },

    /// A value could not be converted to the requested type
    #[error("Unsupported conversion of property '{key}' to {target}: {message}")]
    UnsupportedConversion {
        /// Property key being converted
        key: String,
        /// Requested target type
        target: &'static str,
        /// Error message
        message: String,
        /// Original cause
        #[source]
        source: Option<BoxError>,
    },

    /// The accessor name is not declared
    #[error("Unknown property accessor: {name}")]
    UnknownProperty {
        /// Accessor name
        name: String,
    },

    /// The property is absent and the target type is not optional
    #[error("Property '{key}' is not set and has no default")]
    Missing {
        /// Resolved property key
        key: String,
    },
}

impl ConfigError {
    /// Create a definition error
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }

    /// Create an invalid locator error
    pub fn invalid_locator(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a source unavailable error
    pub fn source_unavailable(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported conversion error without a cause
    pub fn unsupported_conversion(
        key: impl Into<String>,
        target: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::UnsupportedConversion {
            key: key.into(),
            target,
            message: message.into(),
            source: None,
        }
    }

    /// Create an unsupported conversion error wrapping the original cause
    pub fn conversion_caused_by(
        key: impl Into<String>,
        target: &'static str,
        cause: impl Into<BoxError>,
    ) -> Self {
        let cause = cause.into();
        Self::UnsupportedConversion {
            key: key.into(),
            target,
            message: cause.to_string(),
            source: Some(cause),
        }
    }

    /// Create an unknown property error
    pub fn unknown_property(name: impl Into<String>) -> Self {
        Self::UnknownProperty { name: name.into() }
    }

    /// Create a missing property error
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Check if the error is one the load engine swallows
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConfigError::SourceUnavailable { .. })
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::Definition { .. } | ConfigError::InvalidLocator { .. } => {
                ErrorCategory::Definition
            }
            ConfigError::SourceUnavailable { .. } => ErrorCategory::Source,
            ConfigError::UnsupportedConversion { .. } => ErrorCategory::Conversion,
            ConfigError::UnknownProperty { .. } | ConfigError::Missing { .. } => {
                ErrorCategory::Lookup
            }
        }
    }
}

/// Error category for grouping errors
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declaration or locator is malformed
    Definition,
    /// Source could not be read
    Source,
    /// Value could not be typed
    Conversion,
    /// Accessor or value lookup failed
    Lookup,
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::source_unavailable("io", err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::source_unavailable("json", format!("JSON error: {err}"))
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::source_unavailable("toml", format!("TOML error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_categories() {
        assert_eq!(
            ConfigError::definition("x").category(),
            ErrorCategory::Definition
        );
        assert_eq!(
            ConfigError::invalid_locator("::", "bad").category(),
            ErrorCategory::Definition
        );
        assert_eq!(
            ConfigError::source_unavailable("file:a", "gone").category(),
            ErrorCategory::Source
        );
        assert_eq!(
            ConfigError::unsupported_conversion("k", "i32", "nope").category(),
            ErrorCategory::Conversion
        );
        assert_eq!(ConfigError::missing("k").category(), ErrorCategory::Lookup);
        assert!(ConfigError::source_unavailable("a", "b").is_recoverable());
        assert!(!ConfigError::definition("a").is_recoverable());
    }

    #[test]
    fn test_conversion_keeps_cause() {
        let cause = "abc".parse::<i32>().unwrap_err();
        let err = ConfigError::conversion_caused_by("port", "i32", cause);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("port"));
        assert!(err.to_string().contains("i32"));
    }
}
