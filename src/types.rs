//! Common types shared by the binding store, the transfer pipeline and callers

use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use std::fmt;

/// Address-book contact as supplied by the device collaborator.
///
/// Read-only to this crate; only `contact_id` is used as a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Opaque identifier assigned by the device address book
    pub contact_id: String,

    /// Name shown to the user
    pub display_name: String,

    #[serde(default)]
    pub phone_numbers: Vec<String>,

    #[serde(default)]
    pub email_addresses: Vec<String>,

    /// Thumbnail path or URI, if the contact has one
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

impl Contact {
    pub fn new(contact_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            display_name: display_name.into(),
            phone_numbers: Vec::new(),
            email_addresses: Vec::new(),
            avatar_ref: None,
        }
    }
}

/// A contact's validated recipient address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBinding {
    pub contact_id: String,
    pub recipient_address: String,
    /// Unix timestamp (seconds) of the last write
    pub updated_at: i64,
}

/// Terminal (or pending) status of a broadcast transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Failed,
    /// Outcome unknown: the transaction may still land. Re-query by signature
    /// before deciding to send again.
    TimedOut,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Confirmed => "confirmed",
            TransferStatus::Failed => "failed",
            TransferStatus::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Why the node refused a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The embedded blockhash expired before the node saw the transaction
    StaleAnchor,
    InsufficientFunds,
    /// The node already holds this exact signed transaction
    AlreadyProcessed,
    Other,
}

impl RejectionReason {
    /// Classify a node error message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("blockhash not found") || msg.contains("blockhashnotfound") {
            RejectionReason::StaleAnchor
        } else if msg.contains("alreadyprocessed")
            || msg.contains("already been processed")
            || msg.contains("already processed")
        {
            RejectionReason::AlreadyProcessed
        } else if msg.contains("insufficient funds")
            || msg.contains("insufficient lamports")
            || msg.contains("insufficientfundsforfee")
            || msg.contains("custom program error: 0x1")
            || msg.contains("no record of a prior credit")
        {
            RejectionReason::InsufficientFunds
        } else {
            RejectionReason::Other
        }
    }
}

/// Progress of the transfer currently owned by a pipeline.
///
/// Published through a `tokio::sync::watch` channel so a UI can drive its
/// loading indicator from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    Idle,
    Building,
    Broadcasting,
    Confirming,
    Confirmed,
    Failed,
    TimedOut,
    /// The call ended with an error before an outcome existed
    Aborted,
}

impl TransferPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransferPhase::Building | TransferPhase::Broadcasting | TransferPhase::Confirming
        )
    }
}

impl From<TransferStatus> for TransferPhase {
    fn from(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Pending => TransferPhase::Confirming,
            TransferStatus::Confirmed => TransferPhase::Confirmed,
            TransferStatus::Failed => TransferPhase::Failed,
            TransferStatus::TimedOut => TransferPhase::TimedOut,
        }
    }
}

/// Ledger cluster, used to build explorer links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cluster {
    Devnet,
    Testnet,
    MainnetBeta,
    /// Any other node, identified by its RPC URL
    Custom(String),
}

impl Cluster {
    /// Resolve a cluster name from configuration; unknown names fall back to
    /// a custom cluster rooted at `rpc_url`.
    pub fn from_name(name: &str, rpc_url: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "devnet" => Cluster::Devnet,
            "testnet" => Cluster::Testnet,
            "mainnet" | "mainnet-beta" => Cluster::MainnetBeta,
            _ => Cluster::Custom(rpc_url.to_string()),
        }
    }

    /// Explorer page for a transaction signature
    pub fn explorer_tx_url(&self, signature: &Signature) -> String {
        let base = format!("https://explorer.solana.com/tx/{}", signature);
        match self {
            Cluster::MainnetBeta => base,
            Cluster::Devnet => format!("{}?cluster=devnet", base),
            Cluster::Testnet => format!("{}?cluster=testnet", base),
            Cluster::Custom(url) => format!("{}?cluster=custom&customUrl={}", base, url),
        }
    }
}

/// Result of a broadcast transfer, handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    /// Base-58 transaction signature; usable for re-query even when not confirmed
    pub signature: String,
    pub status: TransferStatus,
    /// Node or local reason when the status is `Failed` or `TimedOut`
    pub error_detail: Option<String>,
    pub rejection: Option<RejectionReason>,
    pub explorer_url: String,
}

impl TransactionOutcome {
    pub fn new(signature: &Signature, status: TransferStatus, cluster: &Cluster) -> Self {
        Self {
            signature: signature.to_string(),
            status,
            error_detail: None,
            rejection: None,
            explorer_url: cluster.explorer_tx_url(signature),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_rejection(mut self, reason: RejectionReason) -> Self {
        self.rejection = Some(reason);
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TransferStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert_eq!(
            RejectionReason::classify("Transaction simulation failed: Blockhash not found"),
            RejectionReason::StaleAnchor
        );
        assert_eq!(
            RejectionReason::classify("This transaction has already been processed"),
            RejectionReason::AlreadyProcessed
        );
        assert_eq!(
            RejectionReason::classify(
                "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1"
            ),
            RejectionReason::InsufficientFunds
        );
        assert_eq!(
            RejectionReason::classify("Attempt to debit an account but found no record of a prior credit."),
            RejectionReason::InsufficientFunds
        );
        assert_eq!(
            RejectionReason::classify("Transaction signature verification failure"),
            RejectionReason::Other
        );
    }

    #[test]
    fn test_explorer_urls() {
        let sig = Signature::default();
        assert!(Cluster::Devnet.explorer_tx_url(&sig).ends_with("?cluster=devnet"));
        assert!(!Cluster::MainnetBeta.explorer_tx_url(&sig).contains('?'));
        assert_eq!(
            Cluster::from_name("localnet", "http://127.0.0.1:8899"),
            Cluster::Custom("http://127.0.0.1:8899".to_string())
        );
        assert_eq!(Cluster::from_name("Mainnet-Beta", ""), Cluster::MainnetBeta);
    }

    #[test]
    fn test_phase_from_status() {
        assert_eq!(TransferPhase::from(TransferStatus::TimedOut), TransferPhase::TimedOut);
        assert!(TransferPhase::Confirming.is_in_flight());
        assert!(!TransferPhase::Confirmed.is_in_flight());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }
}
