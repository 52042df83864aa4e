//! Errors raised while framing or exchanging envelopes

use thiserror::Error;

/// Result type for envelope operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur while encoding, sending or decoding an envelope
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// The round trip itself was rejected. Carries the transport's message verbatim.
    #[error("{0}")]
    Transport(String),

    /// A request or response could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// A payload did not match the shape of its declared variant
    #[error("Decode error: {0}")]
    Decode(String),

    /// The value is not an envelope (no string `method` tag)
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The response tag does not pair with the request tag
    #[error("Method mismatch: expected response to '{expected}', got '{actual}'")]
    MethodMismatch {
        /// Tag of the request that was sent
        expected: &'static str,
        /// Tag carried by the response
        actual: String,
    },

    /// A layer answered with a variant its caller cannot use
    #[error("Unexpected response: expected '{expected}', got '{actual}'")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },
}

impl RpcError {
    /// Returns true if the failure came from the transport rather than the codec
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_is_verbatim() {
        let err = RpcError::Transport("No device with ID Serial(9)".into());
        assert_eq!(err.to_string(), "No device with ID Serial(9)");
        assert!(err.is_transport());
    }

    #[test]
    fn test_mismatch_message() {
        let err = RpcError::MethodMismatch {
            expected: "blink",
            actual: "set_id".into(),
        };
        assert!(err.to_string().contains("'blink'"));
        assert!(!err.is_transport());
    }
}
