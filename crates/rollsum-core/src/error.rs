//! Shared error type across rollsum crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input (e.g. empty key).
    InvalidInput,
    /// Ingestion queue is full; retry later.
    Backpressure,
    /// Engine is shut down or shutting down.
    Unavailable,
    /// Configuration rejected.
    InvalidConfig,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::InvalidInput => "INVALID_INPUT",
            ClientCode::Backpressure => "BACKPRESSURE",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::InvalidConfig => "INVALID_CONFIG",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(self, ClientCode::Backpressure)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RollsumError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum RollsumError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("ingestion queue full")]
    Backpressure,
    #[error("engine is shut down")]
    ShutDown,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RollsumError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RollsumError::InvalidInput(_) => ClientCode::InvalidInput,
            RollsumError::Backpressure => ClientCode::Backpressure,
            RollsumError::ShutDown => ClientCode::Unavailable,
            RollsumError::InvalidConfig(_) => ClientCode::InvalidConfig,
            RollsumError::Internal(_) => ClientCode::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.client_code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backpressure_is_retryable() {
        assert!(RollsumError::Backpressure.is_retryable());
        assert!(!RollsumError::ShutDown.is_retryable());
        assert!(!RollsumError::InvalidInput("key".into()).is_retryable());
        assert_eq!(RollsumError::ShutDown.client_code().as_str(), "UNAVAILABLE");
    }
}
