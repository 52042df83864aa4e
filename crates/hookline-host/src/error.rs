//! Host errors

use hookline_core::{DeviceId, RpcError};
use thiserror::Error;

/// Result type alias for host operations
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Errors raised while serving a request
///
/// The display text is what a remote caller receives as the transport
/// failure message.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("No device with ID {0:?}")]
    DeviceNotFound(DeviceId),

    #[error("No domain {0}")]
    DomainNotFound(String),

    #[error("Provider {0} is not connected")]
    NotConnected(String),

    /// The request decoded but cannot be carried out
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// A long-running operation is already in progress
    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl HostError {
    /// Create an invalid request error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether the error names something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HostError::ProviderNotFound(_) | HostError::DeviceNotFound(_) | HostError::DomainNotFound(_)
        )
    }
}

/// CAN bus errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BusError {
    #[error("Bus is not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Bus closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            HostError::ProviderNotFound("P9".into()).to_string(),
            "Provider not found: P9"
        );
        assert_eq!(
            HostError::DeviceNotFound(DeviceId::Serial(42)).to_string(),
            "No device with ID Serial(42)"
        );
        assert_eq!(
            HostError::Rpc(RpcError::Decode("bad".into())).to_string(),
            RpcError::Decode("bad".into()).to_string()
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(HostError::DomainNotFound("x".into()).is_not_found());
        assert!(!HostError::Busy("upgrade".into()).is_not_found());
    }
}
