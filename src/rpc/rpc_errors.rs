use crate::types::RejectionReason;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::RpcError;
use thiserror::Error;

/// Errors from the ledger node, split by where they originate
#[derive(Debug, Clone, Error)]
pub enum LedgerRpcError {
    /// Transport-level errors (network, connection, malformed response)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The node answered and refused the request
    #[error("Rejected by node: {message} (endpoint: {endpoint}, reason: {reason:?}, code: {code:?})")]
    Rejected {
        endpoint: String,
        reason: RejectionReason,
        message: String,
        code: Option<i64>,
    },

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerRpcError {
    /// Build a rejection, classifying the node's message
    pub fn rejected(endpoint: &str, message: impl Into<String>, code: Option<i64>) -> Self {
        let message = message.into();
        LedgerRpcError::Rejected {
            endpoint: endpoint.to_string(),
            reason: RejectionReason::classify(&message),
            message,
            code,
        }
    }

    /// Check if this error is retryable by issuing a new request
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerRpcError::Transport { .. } => true,
            LedgerRpcError::Timeout { .. } => true,
            LedgerRpcError::Rejected { reason, code, .. } => {
                // A stale anchor is cured by rebuilding; server errors by retrying
                *reason == RejectionReason::StaleAnchor
                    || code.map(|c| (500..600).contains(&c)).unwrap_or(false)
            }
            LedgerRpcError::Internal(_) => false,
        }
    }

    /// Rejection reason, if the node refused the request
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            LedgerRpcError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            LedgerRpcError::Transport { endpoint, .. } => Some(endpoint),
            LedgerRpcError::Timeout { endpoint, .. } => Some(endpoint),
            LedgerRpcError::Rejected { endpoint, .. } => Some(endpoint),
            LedgerRpcError::Internal(_) => None,
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        match err.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                // Preflight failures carry the detail in the error's display form
                let detail = if message.trim().is_empty() {
                    err.to_string()
                } else {
                    format!("{} ({})", message, err)
                };
                Self::rejected(endpoint, detail, Some(*code))
            }
            ClientErrorKind::TransactionError(tx_err) => {
                Self::rejected(endpoint, tx_err.to_string(), None)
            }
            _ => {
                let err_str = err.to_string();
                let lower = err_str.to_lowercase();
                if lower.contains("timeout") || lower.contains("timed out") {
                    LedgerRpcError::Timeout {
                        endpoint: endpoint.to_string(),
                        timeout_ms: 0,
                    }
                } else {
                    LedgerRpcError::Transport {
                        endpoint: endpoint.to_string(),
                        message: err_str,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(LedgerRpcError::Transport {
            endpoint: "test".to_string(),
            message: "connection refused".to_string(),
        }
        .is_retryable());

        assert!(LedgerRpcError::rejected("test", "Blockhash not found", Some(-32002)).is_retryable());
        assert!(!LedgerRpcError::rejected("test", "insufficient lamports", Some(-32002)).is_retryable());
        assert!(!LedgerRpcError::Internal("test".to_string()).is_retryable());
    }

    #[test]
    fn test_rejected_classifies_reason() {
        let err = LedgerRpcError::rejected(
            "https://api.devnet.solana.com",
            "Transaction simulation failed: This transaction has already been processed",
            Some(-32002),
        );
        assert_eq!(err.rejection(), Some(RejectionReason::AlreadyProcessed));
        assert_eq!(err.endpoint(), Some("https://api.devnet.solana.com"));
    }

    #[test]
    fn test_from_client_error_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = LedgerRpcError::from_client_error(ClientError::from(io), "http://localhost:8899");
        assert!(matches!(err, LedgerRpcError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_client_error_response() {
        let client_err = ClientError::from(RpcError::RpcResponseError {
            code: -32002,
            message: "Transaction simulation failed: Blockhash not found".to_string(),
            data: solana_rpc_client_api::request::RpcResponseErrorData::Empty,
        });
        let err = LedgerRpcError::from_client_error(client_err, "http://localhost:8899");
        assert_eq!(err.rejection(), Some(RejectionReason::StaleAnchor));
    }
}
