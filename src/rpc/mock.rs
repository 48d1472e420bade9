//! Scriptable in-memory ledger node for tests and dry runs

use super::{Anchor, LedgerRpc, LedgerRpcError, SignatureState};
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{hash::Hash, signature::Signature, transaction::Transaction};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

const MOCK_ENDPOINT: &str = "mock://ledger";

/// Mock node with per-operation call counters.
///
/// Defaults: anchors succeed with a fresh hash, broadcasts are accepted and
/// every status lookup reports `Finalized`. Status responses queued with
/// [`MockLedgerRpc::with_statuses`] are served first, then the fallback.
pub struct MockLedgerRpc {
    anchor_failure: Option<LedgerRpcError>,
    broadcast_failure: Option<LedgerRpcError>,
    statuses: Mutex<VecDeque<Result<Option<SignatureState>, LedgerRpcError>>>,
    fallback_status: Option<SignatureState>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    anchor_calls: AtomicUsize,
    broadcast_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockLedgerRpc {
    pub fn new() -> Self {
        Self {
            anchor_failure: None,
            broadcast_failure: None,
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: Some(SignatureState::Finalized),
            broadcasts: Mutex::new(Vec::new()),
            anchor_calls: AtomicUsize::new(0),
            broadcast_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Anchor fetches fail with a transport error
    pub fn with_anchor_failure(mut self, message: &str) -> Self {
        self.anchor_failure = Some(LedgerRpcError::Transport {
            endpoint: MOCK_ENDPOINT.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Broadcasts are refused by the node with `message`
    pub fn with_broadcast_rejection(mut self, message: &str) -> Self {
        self.broadcast_failure = Some(LedgerRpcError::rejected(MOCK_ENDPOINT, message, Some(-32002)));
        self
    }

    /// Broadcasts fail before reaching the node
    pub fn with_broadcast_transport_failure(mut self, message: &str) -> Self {
        self.broadcast_failure = Some(LedgerRpcError::Transport {
            endpoint: MOCK_ENDPOINT.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Queue status responses, served in order before the fallback
    pub fn with_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<Option<SignatureState>, LedgerRpcError>>,
    ) -> Self {
        self.statuses.lock().extend(statuses);
        self
    }

    /// Status reported once the queue is drained; `None` means "not found"
    pub fn with_fallback_status(mut self, status: Option<SignatureState>) -> Self {
        self.fallback_status = status;
        self
    }

    pub fn anchor_calls(&self) -> usize {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.anchor_calls() + self.broadcast_calls() + self.status_calls()
    }

    /// Wire bytes of every broadcast received, in order
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().clone()
    }
}

impl Default for MockLedgerRpc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    async fn latest_anchor(&self) -> Result<Anchor, LedgerRpcError> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.anchor_failure {
            return Err(err.clone());
        }
        Ok(Anchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000 + self.anchor_calls() as u64,
        })
    }

    async fn send_raw_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerRpcError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        self.broadcasts.lock().push(wire.to_vec());
        if let Some(err) = &self.broadcast_failure {
            return Err(err.clone());
        }

        // Decode like a node would; garbage bytes never get a signature
        let tx: Transaction = bincode::deserialize(wire).map_err(|e| {
            LedgerRpcError::rejected(MOCK_ENDPOINT, format!("failed to deserialize transaction: {}", e), Some(-32602))
        })?;
        tx.signatures.first().copied().ok_or_else(|| {
            LedgerRpcError::rejected(MOCK_ENDPOINT, "transaction has no signatures", Some(-32602))
        })
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureState>, LedgerRpcError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().pop_front() {
            Some(scripted) => scripted,
            None => Ok(self.fallback_status.clone()),
        }
    }

    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }
}
