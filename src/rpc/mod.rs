//! Ledger RPC access
//!
//! The transfer core talks to a node through exactly three operations:
//! fetch a recent anchor, broadcast a raw transaction, and look up a
//! signature's status. [`LedgerRpc`] is the seam; [`SolanaLedgerRpc`] is the
//! production implementation and [`MockLedgerRpc`] a scriptable stand-in.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, signature::Signature};

pub mod mock;
pub mod rpc_errors;
pub mod solana_rpc;

pub use mock::MockLedgerRpc;
pub use rpc_errors::LedgerRpcError;
pub use solana_rpc::SolanaLedgerRpc;

/// Recent blockhash plus the last block height at which it is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Node-reported state of a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    Processed,
    Confirmed,
    Finalized,
    /// Landed but execution failed; carries the node's error text
    Failed(String),
}

impl SignatureState {
    pub fn is_finalized(&self) -> bool {
        matches!(self, SignatureState::Finalized)
    }
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetch the most recent finalized anchor
    async fn latest_anchor(&self) -> Result<Anchor, LedgerRpcError>;

    /// Broadcast a wire-encoded transaction, returning the signature the node
    /// reports for it
    async fn send_raw_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerRpcError>;

    /// Look up a signature. `Ok(None)` means the node has no record of it yet.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, LedgerRpcError>;

    /// Endpoint label for logs
    fn endpoint(&self) -> &str;
}
