//! Error types for the LISA bridge

use thiserror::Error;

/// Core bridge errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LisaError {
    // Connect-phase errors
    #[error("Token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),

    #[error("Transport connect failed: {0}")]
    TransportConnectFailed(String),

    // Session errors
    #[error("No active session")]
    NotConnected,

    #[error("Connect already in progress")]
    ConnectInProgress,

    #[error("Already connected")]
    AlreadyConnected,

    // Channel errors
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LisaError {
    /// Errors raised while establishing a session; these abort the
    /// connect attempt and return the lifecycle to disconnected.
    pub fn is_connect_phase(&self) -> bool {
        matches!(
            self,
            LisaError::TokenAcquisitionFailed(_) | LisaError::TransportConnectFailed(_)
        )
    }
}

/// Result type for bridge operations
pub type LisaResult<T> = Result<T, LisaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_phase_classification() {
        assert!(LisaError::TokenAcquisitionFailed("503".into()).is_connect_phase());
        assert!(LisaError::TransportConnectFailed("refused".into()).is_connect_phase());
        assert!(!LisaError::SendFailed("closed".into()).is_connect_phase());
        assert!(!LisaError::NotConnected.is_connect_phase());
    }

    #[test]
    fn test_error_display() {
        let err = LisaError::BufferTooShort {
            expected: 3,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Buffer too short: expected 3, got 1");
    }
}
