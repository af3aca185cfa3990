//! Error types for exoscale-polling configuration

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
///
/// Failures of a polling run itself are reported through
/// [`PollError`](crate::poll::PollError) and
/// [`OperationError`](crate::operation::OperationError).
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration values
    #[error("Invalid polling configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = Error::invalid_config("max-delay-ms is below initial-delay-ms");
        assert_eq!(
            err.to_string(),
            "Invalid polling configuration: max-delay-ms is below initial-delay-ms"
        );
    }

    #[test]
    fn test_yaml_error_conversion() {
        let parse: std::result::Result<u32, _> = serde_yaml_ng::from_str("[not, a, number]");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::YamlParse(_)));
        assert!(err.to_string().starts_with("YAML parsing error"));
    }
}
