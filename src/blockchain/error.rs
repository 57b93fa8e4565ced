// src/blockchain/error.rs

use std::time::Duration;
use thiserror::Error;

/// Errors produced by ABI resolution, encoding and bundle simulation.
///
/// The enum is `Clone` so a failed initializer in [`crate::blockchain::cache::MemoCache`]
/// can be handed to every task waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{provider} error: {message}")]
    RemoteProvider { provider: String, message: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("encoding failed: {0}")]
    Encoding(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn remote(provider: &str, message: impl Into<String>) -> Self {
        Error::RemoteProvider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Maps a transport failure to `Timeout` or `RemoteProvider`.
    pub fn from_reqwest(provider: &str, err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            Error::timeout(provider, after)
        } else {
            Error::remote(provider, err.to_string())
        }
    }

    /// Short machine-readable kind, used by the tool surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::RemoteProvider { .. } => "remote_provider",
            Error::Validation(_) => "validation",
            Error::Timeout { .. } => "timeout",
            Error::Encoding(_) => "encoding",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_keeps_provider_message() {
        let err = Error::remote("etherscan", "Contract source code not verified");
        assert_eq!(
            err.to_string(),
            "etherscan error: Contract source code not verified"
        );
        assert_eq!(err.kind(), "remote_provider");
    }

    #[test]
    fn test_timeout_is_distinct_kind() {
        let err = Error::timeout("tenderly", Duration::from_secs(5));
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("tenderly timed out"));
    }
}
