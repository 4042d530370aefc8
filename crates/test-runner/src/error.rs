//! Error types for test-runner

use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors raised while talking to the remote test executor.
///
/// None of these escape the public orchestration operations; they are
/// folded into a response envelope there.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Could not reach the executor
    #[error("Failed to connect to executor: {message}")]
    Connection { message: String },

    /// Executor answered with a non-success HTTP status
    #[error("Executor returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    /// Request took longer than the configured timeout
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Executor reply could not be decoded
    #[error("Invalid executor response: {message}")]
    InvalidResponse { message: String },

    /// Command payload could not be built
    #[error("Invalid command: {0}")]
    Command(#[from] testrun_core::Error),

    /// Any other transport failure
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl RunnerError {
    /// Create a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether sending the same command again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::InvalidResponse { .. } | Self::Command(_) | Self::Transport { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RunnerError::connection("refused").is_retryable());
        assert!(RunnerError::Timeout { seconds: 30 }.is_retryable());
        assert!(RunnerError::Remote {
            status: 503,
            message: "reloading".to_string()
        }
        .is_retryable());
        assert!(!RunnerError::Remote {
            status: 400,
            message: "bad params".to_string()
        }
        .is_retryable());
        assert!(!RunnerError::transport("closed").is_retryable());
    }
}
