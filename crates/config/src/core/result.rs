//! Result type and utilities for configuration operations

use super::error::ConfigError;

/// Standard result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Extension trait for Result types to add configuration-specific utilities
pub trait ConfigResultExt<T> {
    /// Prefix the error message with additional context
    fn with_context<F>(self, f: F) -> ConfigResult<T>
    where
        F: FnOnce() -> String;

    /// Convert to option, logging the error if present
    fn log_error(self) -> Option<T>;
}

impl<T> ConfigResultExt<T> for ConfigResult<T> {
    fn with_context<F>(self, f: F) -> ConfigResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e {
            ConfigError::Definition { message } => ConfigError::Definition {
                message: format!("{}: {message}", f()),
            },
            ConfigError::SourceUnavailable { locator, message } => {
                ConfigError::SourceUnavailable {
                    locator,
                    message: format!("{}: {message}", f()),
                }
            }
            ConfigError::UnsupportedConversion {
                key,
                target,
                message,
                source,
            } => ConfigError::UnsupportedConversion {
                key,
                target,
                message: format!("{}: {message}", f()),
                source,
            },
            other => other,
        })
    }

    fn log_error(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, category = ?e.category(), "Configuration error");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_prefixes_message() {
        let result: ConfigResult<()> = Err(ConfigError::definition("empty name"));
        let err = result
            .with_context(|| "substitutor".to_string())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration definition: substitutor: empty name"
        );
    }

    #[test]
    fn test_with_context_leaves_other_variants() {
        let result: ConfigResult<()> = Err(ConfigError::missing("a.b"));
        let err = result.with_context(|| "ctx".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn test_log_error() {
        let ok: ConfigResult<u8> = Ok(3);
        assert_eq!(ok.log_error(), Some(3));
        let err: ConfigResult<u8> = Err(ConfigError::missing("k"));
        assert_eq!(err.log_error(), None);
    }
}
