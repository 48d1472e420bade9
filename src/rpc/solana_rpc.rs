//! `LedgerRpc` over the nonblocking Solana JSON-RPC client

use super::{Anchor, LedgerRpc, LedgerRpcError, SignatureState};
use crate::metrics::Timer;
use async_trait::async_trait;
use base64::Engine;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::{config::RpcSendTransactionConfig, request::RpcRequest};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    signature::Signature,
};
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct SolanaLedgerRpc {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for SolanaLedgerRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedgerRpc")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment.commitment)
            .finish_non_exhaustive()
    }
}

impl SolanaLedgerRpc {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, commitment: CommitmentConfig) -> Self {
        let endpoint = endpoint.into();
        let client = RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self {
            client: Arc::new(client),
            endpoint,
            commitment,
        }
    }

    /// Parse a commitment name from configuration (`processed`, `confirmed`, `finalized`)
    pub fn parse_commitment(name: &str) -> Result<CommitmentConfig, LedgerRpcError> {
        CommitmentLevel::from_str(name)
            .map(|commitment| CommitmentConfig { commitment })
            .map_err(|_| LedgerRpcError::Internal(format!("Unknown commitment level: {}", name)))
    }

    /// Anchors always come from a rooted block, whatever the status commitment
    pub fn anchor_commitment(&self) -> CommitmentConfig {
        CommitmentConfig::finalized()
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedgerRpc {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn latest_anchor(&self) -> Result<Anchor, LedgerRpcError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.anchor_commitment())
            .await
            .map_err(|e| LedgerRpcError::from_client_error(e, &self.endpoint))?;
        timer.finish();

        debug!(blockhash = %blockhash, last_valid_block_height, "Fetched anchor");
        Ok(Anchor {
            blockhash,
            last_valid_block_height,
        })
    }

    #[instrument(skip(self, wire), fields(endpoint = %self.endpoint, bytes = wire.len()))]
    async fn send_raw_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerRpcError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wire);
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            ..RpcSendTransactionConfig::default()
        };

        let timer = Timer::with_name("rpc_latency_seconds");
        let signature: String = self
            .client
            .send(
                RpcRequest::SendTransaction,
                serde_json::json!([encoded, config]),
            )
            .await
            .map_err(|e| LedgerRpcError::from_client_error(e, &self.endpoint))?;
        timer.finish();

        Signature::from_str(&signature).map_err(|e| LedgerRpcError::Transport {
            endpoint: self.endpoint.clone(),
            message: format!("Node returned unparsable signature {:?}: {}", signature, e),
        })
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, LedgerRpcError> {
        let response = self
            .client
            .get_signature_statuses_with_history(&[*signature])
            .await
            .map_err(|e| LedgerRpcError::from_client_error(e, &self.endpoint))?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(None),
        };

        if let Some(err) = status.err {
            return Ok(Some(SignatureState::Failed(err.to_string())));
        }

        let state = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => SignatureState::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => SignatureState::Confirmed,
            Some(TransactionConfirmationStatus::Processed) => SignatureState::Processed,
            // Older nodes omit the field; no confirmation count means rooted
            None if status.confirmations.is_none() => SignatureState::Finalized,
            None => SignatureState::Processed,
        };
        Ok(Some(state))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commitment() {
        assert_eq!(
            SolanaLedgerRpc::parse_commitment("finalized").unwrap(),
            CommitmentConfig::finalized()
        );
        assert_eq!(
            SolanaLedgerRpc::parse_commitment("confirmed").unwrap(),
            CommitmentConfig::confirmed()
        );
        assert!(SolanaLedgerRpc::parse_commitment("eventually").is_err());
    }

    #[test]
    fn test_anchor_commitment_is_finalized() {
        let rpc = SolanaLedgerRpc::new(
            "http://127.0.0.1:8899",
            Duration::from_secs(5),
            CommitmentConfig::processed(),
        );
        assert_eq!(rpc.anchor_commitment(), CommitmentConfig::finalized());
    }

    #[test]
    fn test_debug_hides_client() {
        let rpc = SolanaLedgerRpc::new(
            "http://127.0.0.1:8899",
            Duration::from_secs(5),
            CommitmentConfig::finalized(),
        );
        let rendered = format!("{:?}", rpc);
        assert!(rendered.contains("127.0.0.1:8899"));
        assert_eq!(rpc.endpoint(), "http://127.0.0.1:8899");
    }
}
