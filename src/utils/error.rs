use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Lookup failed for '{identifier}': {message}")]
    OperationError { identifier: String, message: String },

    #[error("Lookup for '{identifier}' timed out after {timeout:?}")]
    TimeoutError {
        identifier: String,
        timeout: Duration,
    },

    #[error("Remote service returned HTTP {status}: {message}")]
    HttpStatusError { status: u16, message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ItemOperation,
    Cache,
    Network,
    Io,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DiscoveryError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn operation(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationError {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::OperationError { .. } | Self::TimeoutError { .. } => ErrorCategory::ItemOperation,
            Self::ApiError(_) | Self::HttpStatusError { .. } => ErrorCategory::Network,
            Self::CacheError { .. } => ErrorCategory::Cache,
            Self::IoError(_) => ErrorCategory::Io,
            Self::CsvError(_) | Self::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Cache => ErrorSeverity::Low,
            ErrorCategory::ItemOperation | ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// Per-item errors are recorded as data in the batch result instead of aborting it.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ItemOperation | ErrorCategory::Network
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the configuration file and command line arguments"
            }
            Self::InvalidConfigValueError { .. } => {
                "Correct the highlighted value; concurrency must be at least 1"
            }
            Self::MissingConfigError { .. } => "Add the missing field to the configuration",
            Self::OperationError { .. } => "Retry the failed identifiers in a new batch",
            Self::TimeoutError { .. } => {
                "Increase per_item_timeout_ms or lower the concurrency"
            }
            Self::ApiError(_) => "Check network connectivity and the source endpoint",
            Self::HttpStatusError { status, .. } if *status == 429 => {
                "The remote service is rate limiting; raise inter_start_delay_ms"
            }
            Self::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Check the API credentials in [source.headers]"
            }
            Self::HttpStatusError { .. } => "Inspect the remote service response and retry",
            Self::CacheError { .. } => "Delete or repair the cache file; the batch can run without it",
            Self::IoError(_) => "Check file paths and permissions",
            Self::CsvError(_) => "Make sure the input file is valid CSV with a header row",
            Self::SerializationError(_) => "Make sure the data is valid JSON",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::ItemOperation | ErrorCategory::Network => {
                format!("Profile lookup failed: {}", self)
            }
            ErrorCategory::Cache => format!("Profile cache unavailable: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Could not read input data: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = DiscoveryError::config("concurrency must be >= 1");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(!err.is_item_level());

        let err = DiscoveryError::TimeoutError {
            identifier: "Sierra Club".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.category(), ErrorCategory::ItemOperation);
        assert!(err.is_item_level());

        let err = DiscoveryError::cache("disk full");
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_error_messages_include_identifier() {
        let err = DiscoveryError::operation("ACLU", "no website found");
        assert_eq!(err.to_string(), "Lookup failed for 'ACLU': no website found");
        assert!(err.user_friendly_message().contains("ACLU"));
    }

    #[test]
    fn test_rate_limit_suggestion() {
        let err = DiscoveryError::HttpStatusError {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(err.recovery_suggestion().contains("inter_start_delay_ms"));
    }
}
