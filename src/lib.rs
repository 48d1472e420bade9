//! contact-pay - contact-addressed Solana transfers
//!
//! Bind wallet addresses to address-book contacts and send SOL to them:
//! validate the recipient, build and sign a System Program transfer, broadcast
//! it and poll until it is finalized, fails, or the confirmation window closes.

pub mod address;
pub mod binding_store;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod rpc;
pub mod structured_logging;
pub mod submitter;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use address::{is_valid_address, validate_address, AddressError};
pub use binding_store::{AddressBindingStore, StoreError};
pub use config::Config;
pub use pipeline::{PipelineError, TransferPipeline};
pub use rpc::{LedgerRpc, LedgerRpcError, MockLedgerRpc, SolanaLedgerRpc};
pub use submitter::{CancelToken, ConfirmationPolicy, SubmitError, TransactionSubmitter};
pub use tx_builder::{BuildError, SignedTransfer, TransactionBuilder};
pub use types::{
    AddressBinding, Cluster, Contact, RejectionReason, TransactionOutcome, TransferPhase,
    TransferStatus,
};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
