//! Errors raised by the IPC and remoting layers
//!
//! Module loading has its own error type in [`crate::module::traits::ModuleError`];
//! everything that travels over a channel surfaces as a [`RemotingError`].

use thiserror::Error;

/// Result alias for the IPC and remoting layers
pub type Result<T> = std::result::Result<T, RemotingError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemotingError {
    /// Operation attempted on a disposed communicator, channel, proxy or graph
    #[error("{0} is disposed.")]
    Disposed(String),

    /// The underlying channel refused the message
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Request to \"{path}\" timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },

    /// Error raised by the remote handler, carried back in the reply body
    #[error("{0}")]
    Remote(String),

    /// Malformed or unexpected message
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Target ({0}) doesn't exist.")]
    UnknownReference(String),

    #[error("Target ({0}) is not a function which cannot be applied.")]
    NotCallable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for RemotingError {
    fn from(e: serde_json::Error) -> Self {
        RemotingError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for RemotingError {
    fn from(e: std::io::Error) -> Self {
        RemotingError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RemotingError::Disposed("Communicator (a)".to_string()).to_string(),
            "Communicator (a) is disposed."
        );
        assert_eq!(
            RemotingError::UnknownReference("42".to_string()).to_string(),
            "Target (42) doesn't exist."
        );
        let err = RemotingError::Timeout {
            path: "/x".to_string(),
            timeout_ms: 10,
        };
        assert!(err.to_string().contains("/x"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: RemotingError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RemotingError::Serialization(_)));
    }
}
