//! Error types for transfer building
//!
//! Errors are designed to be:
//! - Informative: the failing input or node message is carried along
//! - Classified: each variant maps to one retry decision and metrics category

use super::amount::AmountError;
use crate::address::AddressError;
use crate::rpc::LedgerRpcError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BuildError {
    /// Amount did not convert to a positive whole number of lamports
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Recipient is not a well-formed address
    #[error("Invalid recipient address: {0}")]
    InvalidFormat(#[from] AddressError),

    /// Anchor fetch failed
    ///
    /// Retryable by the caller issuing a new transfer.
    #[error("Network error while fetching anchor: {0}")]
    Network(#[from] LedgerRpcError),

    /// Signing or self-verification failed
    ///
    /// Fatal: indicates a corrupted key or a bug. Never retried.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Transaction could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl BuildError {
    /// Check if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::InvalidAmount(_) => false,
            Self::InvalidFormat(_) => false,
            Self::Signing(_) => false,
            Self::Serialization(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "amount",
            Self::InvalidFormat(_) => "address",
            Self::Network(_) => "network",
            Self::Signing(_) => "signing",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn signing(reason: impl Into<String>) -> Self {
        Self::Signing(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuildError::InvalidAmount(AmountError::NonPositive);
        assert_eq!(
            err.to_string(),
            "Invalid amount: Amount must be greater than zero"
        );

        let err = BuildError::signing("signature does not verify");
        assert_eq!(err.to_string(), "Signing failed: signature does not verify");
    }

    #[test]
    fn test_error_retryability() {
        let network = BuildError::Network(LedgerRpcError::Transport {
            endpoint: "test".to_string(),
            message: "reset".to_string(),
        });
        assert!(network.is_retryable());
        assert!(!BuildError::signing("bad key").is_retryable());
        assert!(!BuildError::InvalidFormat(AddressError::Empty).is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(BuildError::InvalidFormat(AddressError::Empty).category(), "address");
        assert_eq!(BuildError::signing("x").category(), "signing");
    }
}
