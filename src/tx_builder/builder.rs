//! Core transfer building: amount conversion, anchor fetch, sign, self-verify

use super::amount::sol_to_lamports;
use super::errors::BuildError;
use super::output::SignedTransfer;
use crate::address::validate_address;
use crate::metrics::{metrics, Timer};
use crate::rpc::{Anchor, LedgerRpc};
#[allow(deprecated)]
use solana_sdk::system_instruction;
use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Builds signed single-instruction transfers.
///
/// Holds no key material; the sender keypair is borrowed for one call.
pub struct TransactionBuilder {
    rpc: Arc<dyn LedgerRpc>,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Build and sign a transfer of `amount_sol` from `sender` to `recipient`.
    ///
    /// Inputs are checked before the single network read (anchor fetch), so
    /// a bad amount or address never touches the node. The anchor is fetched
    /// immediately before signing.
    #[instrument(skip(self, sender), fields(sender = %sender.pubkey()))]
    pub async fn build(
        &self,
        sender: &Keypair,
        recipient: &str,
        amount_sol: &str,
    ) -> Result<SignedTransfer, BuildError> {
        let lamports = sol_to_lamports(amount_sol)?;
        let recipient = validate_address(recipient)?;

        let anchor = self.rpc.latest_anchor().await.map_err(|e| {
            warn!(error = %e, endpoint = self.rpc.endpoint(), "Anchor fetch failed");
            e
        })?;

        let timer = Timer::with_name("build_latency_seconds");
        let signed = sign_transfer(sender, &recipient, lamports, anchor);
        timer.finish();

        if let Err(e) = &signed {
            metrics().signing_failures.inc();
            warn!(error = %e, "Refusing to return unverifiable transaction");
        }
        signed
    }
}

/// Assemble, sign and self-verify a transfer against a known anchor.
///
/// Pure apart from signing; used by [`TransactionBuilder::build`] once the
/// anchor is in hand.
pub fn sign_transfer(
    sender: &Keypair,
    recipient: &Pubkey,
    lamports: u64,
    anchor: Anchor,
) -> Result<SignedTransfer, BuildError> {
    let fee_payer = sender.pubkey();
    #[allow(deprecated)]
    let instruction = system_instruction::transfer(&fee_payer, recipient, lamports);
    let message = Message::new(&[instruction], Some(&fee_payer));

    let mut tx = Transaction::new_unsigned(message);
    tx.try_sign(&[sender], anchor.blockhash)
        .map_err(|e| BuildError::signing(e.to_string()))?;

    verify_fee_payer_signature(&tx, &fee_payer)?;

    debug!(
        signature = %tx.signatures[0],
        blockhash = %anchor.blockhash,
        lamports,
        "Transfer signed and verified"
    );
    Ok(SignedTransfer::new(tx, anchor, *recipient, lamports))
}

/// Check that `tx` carries exactly one signature, from `fee_payer`, and that
/// it verifies against the serialized message.
pub fn verify_fee_payer_signature(tx: &Transaction, fee_payer: &Pubkey) -> Result<(), BuildError> {
    if tx.message.header.num_required_signatures != 1 || tx.signatures.len() != 1 {
        return Err(BuildError::signing(format!(
            "expected exactly one signature, found {} (header requires {})",
            tx.signatures.len(),
            tx.message.header.num_required_signatures
        )));
    }
    if tx.message.account_keys.first() != Some(fee_payer) {
        return Err(BuildError::signing("fee payer is not the first account key"));
    }
    if !tx.signatures[0].verify(fee_payer.as_ref(), &tx.message_data()) {
        return Err(BuildError::signing(
            "fee payer signature does not verify against message",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockLedgerRpc;
    use proptest::prelude::*;
    use solana_sdk::{hash::Hash, signature::Signature, system_program};

    fn anchor() -> Anchor {
        Anchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 150,
        }
    }

    #[tokio::test]
    async fn test_build_produces_verifiable_transfer() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let builder = TransactionBuilder::new(rpc.clone());
        let sender = Keypair::new();
        let recipient = Pubkey::new_unique();

        let signed = builder
            .build(&sender, &recipient.to_string(), "0.01")
            .await
            .unwrap();

        assert_eq!(rpc.anchor_calls(), 1);
        assert_eq!(signed.lamports(), 10_000_000);
        assert_eq!(signed.fee_payer(), sender.pubkey());
        assert_eq!(signed.recipient(), &recipient);
        assert_eq!(signed.transaction().message.recent_blockhash, signed.anchor().blockhash);
        assert!(verify_fee_payer_signature(signed.transaction(), &sender.pubkey()).is_ok());
        assert!(signed.transaction().verify().is_ok());

        let ix = &signed.transaction().message.instructions[0];
        let program = signed.transaction().message.account_keys[ix.program_id_index as usize];
        assert_eq!(program, system_program::id());
    }

    #[tokio::test]
    async fn test_bad_inputs_make_no_network_calls() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let builder = TransactionBuilder::new(rpc.clone());
        let sender = Keypair::new();

        let err = builder
            .build(&sender, &Pubkey::new_unique().to_string(), "0")
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidAmount(_)));

        let err = builder
            .build(&sender, "not-a-real-address", "1.5")
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidFormat(_)));

        assert_eq!(rpc.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_anchor_failure_is_network_error() {
        let rpc = Arc::new(MockLedgerRpc::new().with_anchor_failure("connection reset"));
        let builder = TransactionBuilder::new(rpc.clone());

        let err = builder
            .build(&Keypair::new(), &Pubkey::new_unique().to_string(), "1")
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Network(_)));
        assert!(err.is_retryable());
        assert_eq!(rpc.anchor_calls(), 1);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let sender = Keypair::new();
        let recipient = Pubkey::new_unique();
        let anchor = anchor();
        let a = sign_transfer(&sender, &recipient, 42, anchor).unwrap();
        let b = sign_transfer(&sender, &recipient, 42, anchor).unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.wire_bytes().unwrap(), b.wire_bytes().unwrap());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let sender = Keypair::new();
        let signed = sign_transfer(&sender, &Pubkey::new_unique(), 1, anchor()).unwrap();

        let mut tx = signed.transaction().clone();
        tx.signatures[0] = Signature::from([7u8; 64]);
        assert!(matches!(
            verify_fee_payer_signature(&tx, &sender.pubkey()),
            Err(BuildError::Signing(_))
        ));

        let other = Keypair::new();
        assert!(verify_fee_payer_signature(signed.transaction(), &other.pubkey()).is_err());
    }

    #[test]
    fn test_wire_bytes_round_trip() {
        let sender = Keypair::new();
        let signed = sign_transfer(&sender, &Pubkey::new_unique(), 5_000, anchor()).unwrap();
        let bytes = signed.wire_bytes().unwrap();

        // First byte is the compact-u16 signature count
        assert_eq!(bytes[0], 1);
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(&decoded, signed.transaction());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_build_verifies(lamports in 1u64..=u64::MAX, seed in any::<[u8; 32]>()) {
            let sender = Keypair::new();
            let recipient = Pubkey::new_from_array(seed);
            let signed = sign_transfer(&sender, &recipient, lamports, anchor()).unwrap();
            let tx = signed.transaction();
            prop_assert!(tx.signatures[0].verify(sender.pubkey().as_ref(), &tx.message_data()));
        }
    }
}
