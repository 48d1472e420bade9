//! Signed transfer ready for broadcast
//!
//! `SignedTransfer` owns the signed transaction and the anchor it was built
//! against. It never holds the sender's secret key.

use super::errors::BuildError;
use crate::rpc::Anchor;
use solana_sdk::{
    packet::PACKET_DATA_SIZE, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

#[derive(Debug, Clone)]
pub struct SignedTransfer {
    tx: Transaction,
    anchor: Anchor,
    recipient: Pubkey,
    lamports: u64,
}

impl SignedTransfer {
    pub(crate) fn new(tx: Transaction, anchor: Anchor, recipient: Pubkey, lamports: u64) -> Self {
        Self {
            tx,
            anchor,
            recipient,
            lamports,
        }
    }

    /// The fee payer's signature, which also identifies the transaction
    pub fn signature(&self) -> Signature {
        self.tx.signatures.first().copied().unwrap_or_default()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Sender and fee payer
    pub fn fee_payer(&self) -> Pubkey {
        self.tx.message.account_keys.first().copied().unwrap_or_default()
    }

    pub fn recipient(&self) -> &Pubkey {
        &self.recipient
    }

    pub fn lamports(&self) -> u64 {
        self.lamports
    }

    /// Encode in the network wire format: compact-u16 signature list,
    /// message header, account keys, recent blockhash, instructions.
    pub fn wire_bytes(&self) -> Result<Vec<u8>, BuildError> {
        let bytes = bincode::serialize(&self.tx)
            .map_err(|e| BuildError::Serialization(e.to_string()))?;
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(BuildError::Serialization(format!(
                "transaction is {} bytes, limit is {}",
                bytes.len(),
                PACKET_DATA_SIZE
            )));
        }
        Ok(bytes)
    }
}
