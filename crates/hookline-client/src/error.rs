//! Error types for client operations

use hookline_core::RpcError;
use thiserror::Error;

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Round trip failed or the envelope could not be decoded
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A value was rejected before any call was issued
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A replay file could not be imported
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    /// The device class has no registered driver, or the driver lacks the operation
    #[error("Unsupported device class: {device_class}")]
    Unsupported { device_class: String },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON export failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The replay scheduler task is gone
    #[error("Replay scheduler stopped")]
    SchedulerClosed,
}

impl ClientError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-class error
    pub fn unsupported(device_class: impl Into<String>) -> Self {
        Self::Unsupported {
            device_class: device_class.into(),
        }
    }
}

/// Errors raised while importing a replay file
///
/// Any error aborts the whole import.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    /// The file is not readable as CSV with a header row
    #[error("CSV error: {0}")]
    Csv(String),

    /// A field is missing or does not parse
    #[error("{field} is invalid / could not be parsed as a number ({value}, {row})")]
    InvalidField {
        /// Column that failed
        field: &'static str,
        /// Raw text of the field (empty when missing)
        value: String,
        /// Raw row as JSON
        row: String,
    },

    /// The file holds no frames
    #[error("No frames in file")]
    Empty,
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}
