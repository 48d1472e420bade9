//! Transfer pipeline: validate, build, broadcast, confirm
//!
//! A pipeline owns at most one in-flight transfer. A second call while one is
//! running is refused with [`PipelineError::AlreadyInProgress`] and makes no
//! network calls. Progress is published on a watch channel so callers can
//! drive a loading indicator from [`TransferPipeline::subscribe`].

use crate::address::{validate_address, AddressError};
use crate::binding_store::{AddressBindingStore, StoreError};
use crate::config::Config;
use crate::metrics::metrics;
use crate::rpc::{LedgerRpc, LedgerRpcError, SolanaLedgerRpc};
use crate::structured_logging::TransferContext;
use crate::submitter::{CancelToken, ConfirmationPolicy, SubmitError, TransactionSubmitter};
use crate::tx_builder::{sol_to_lamports, AmountError, BuildError, TransactionBuilder};
use crate::types::{Cluster, Contact, TransactionOutcome, TransferPhase, TransferStatus};
use parking_lot::Mutex;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid recipient address: {0}")]
    InvalidFormat(#[from] AddressError),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Anchor fetch or broadcast did not reach the node
    #[error("Network error: {0}")]
    Network(#[from] LedgerRpcError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("A transfer is already in progress")]
    AlreadyInProgress,

    #[error("No address bound for contact {0}")]
    NoBinding(String),

    #[error("Binding store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<BuildError> for PipelineError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::InvalidAmount(e) => Self::InvalidAmount(e),
            BuildError::InvalidFormat(e) => Self::InvalidFormat(e),
            BuildError::Network(e) => Self::Network(e),
            BuildError::Signing(msg) => Self::Signing(msg),
            BuildError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Network(e) => Self::Network(e),
            SubmitError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl PipelineError {
    /// Whether issuing a fresh call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::AlreadyInProgress => true,
            Self::Store(StoreError::Backend(_)) => true,
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "address",
            Self::InvalidAmount(_) => "amount",
            Self::Network(_) => "network",
            Self::Signing(_) => "signing",
            Self::Serialization(_) => "serialization",
            Self::AlreadyInProgress => "busy",
            Self::NoBinding(_) => "no_binding",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
        }
    }
}

/// Clears the pipeline's busy flag and in-flight gauge when dropped
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    current_cancel: &'a Mutex<Option<CancelToken>>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, current_cancel: &'a Mutex<Option<CancelToken>>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        metrics().transfers_in_flight.inc();
        Some(Self {
            flag,
            current_cancel,
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.current_cancel.lock().take();
        metrics().transfers_in_flight.dec();
        self.flag.store(false, Ordering::Release);
    }
}

pub struct TransferPipeline {
    builder: TransactionBuilder,
    submitter: TransactionSubmitter,
    in_flight: AtomicBool,
    phase_tx: watch::Sender<TransferPhase>,
    current_cancel: Mutex<Option<CancelToken>>,
}

impl TransferPipeline {
    pub fn new(rpc: Arc<dyn LedgerRpc>, policy: ConfirmationPolicy, cluster: Cluster) -> Self {
        let (phase_tx, _rx) = watch::channel(TransferPhase::Idle);
        Self {
            builder: TransactionBuilder::new(rpc.clone()),
            submitter: TransactionSubmitter::new(rpc, policy, cluster),
            in_flight: AtomicBool::new(false),
            phase_tx,
            current_cancel: Mutex::new(None),
        }
    }

    /// Pipeline over a Solana JSON-RPC node described by `config`
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let commitment = SolanaLedgerRpc::parse_commitment(&config.rpc.commitment)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let rpc = SolanaLedgerRpc::new(config.rpc.endpoint.clone(), config.rpc_timeout(), commitment);
        let mut policy = ConfirmationPolicy::new(config.poll_interval(), config.confirmation_timeout());
        policy.accept_confirmed = config.rpc.commitment != "finalized";
        Ok(Self::new(Arc::new(rpc), policy, config.cluster()))
    }

    /// Receiver of the current transfer phase
    pub fn subscribe(&self) -> watch::Receiver<TransferPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> TransferPhase {
        *self.phase_tx.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stop waiting on the in-flight transfer's confirmation.
    ///
    /// The transfer resolves as `TimedOut`; it may still land. Returns false
    /// when nothing is in flight.
    pub fn cancel_current(&self) -> bool {
        match self.current_cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Re-query a transfer by signature, typically after `TimedOut`
    pub async fn query_status(&self, signature: &Signature) -> Result<TransactionOutcome, PipelineError> {
        Ok(self.submitter.query_status(signature).await?)
    }

    /// Send `amount_sol` from `sender` to `recipient`.
    ///
    /// The keypair is consumed and dropped when the call returns. Input
    /// errors are reported before any network call; node rejections come
    /// back as a `Failed` outcome rather than an error.
    #[instrument(skip(self, sender), fields(sender = %sender.pubkey()))]
    pub async fn send_transfer(
        &self,
        sender: Keypair,
        recipient: &str,
        amount_sol: &str,
    ) -> Result<TransactionOutcome, PipelineError> {
        validate_address(recipient)?;
        sol_to_lamports(amount_sol)?;

        let cancel = CancelToken::new();
        let guard = match InFlightGuard::acquire(&self.in_flight, &self.current_cancel) {
            Some(guard) => guard,
            None => {
                metrics().transfers_rejected_busy.inc();
                warn!(recipient = %recipient, "Refusing transfer, another is in flight");
                return Err(PipelineError::AlreadyInProgress);
            }
        };
        *self.current_cancel.lock() = Some(cancel.clone());

        let ctx = TransferContext::new("send_transfer");
        let started = Instant::now();
        metrics().transfers_total.inc();
        ctx.logger
            .log_transfer_attempt(&sender.pubkey().to_string(), recipient, amount_sol);

        let result = self.run(&ctx, &sender, recipient, amount_sol, &cancel).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        // Free the slot before observers see a terminal phase
        drop(guard);

        match &result {
            Ok(outcome) => {
                match outcome.status {
                    TransferStatus::Confirmed => metrics().transfers_confirmed.inc(),
                    TransferStatus::Failed => metrics().transfers_failed.inc(),
                    TransferStatus::TimedOut => metrics().transfers_timed_out.inc(),
                    TransferStatus::Pending => {}
                }
                ctx.logger.log_outcome(
                    &outcome.signature,
                    &outcome.status.to_string(),
                    outcome.error_detail.as_deref(),
                    latency_ms,
                );
                self.phase_tx.send_replace(outcome.status.into());
            }
            Err(e) => {
                ctx.logger.log_failure(e.category(), &e.to_string(), latency_ms);
                self.phase_tx.send_replace(TransferPhase::Aborted);
            }
        }
        result
    }

    async fn run(
        &self,
        ctx: &TransferContext,
        sender: &Keypair,
        recipient: &str,
        amount_sol: &str,
        cancel: &CancelToken,
    ) -> Result<TransactionOutcome, PipelineError> {
        self.phase_tx.send_replace(TransferPhase::Building);
        let signed = self.builder.build(sender, recipient, amount_sol).await?;
        ctx.logger.log_signed(
            &signed.signature().to_string(),
            signed.lamports(),
            signed.anchor().last_valid_block_height,
        );

        let outcome = self
            .submitter
            .submit_reporting(&signed, cancel, |phase| {
                self.phase_tx.send_replace(phase);
            })
            .await?;
        Ok(outcome)
    }

    /// Send to the address bound to `contact`
    #[instrument(skip(self, sender, store, contact), fields(contact_id = %contact.contact_id))]
    pub async fn send_to_contact(
        &self,
        sender: Keypair,
        store: &AddressBindingStore,
        contact: &Contact,
        amount_sol: &str,
    ) -> Result<TransactionOutcome, PipelineError> {
        let binding = match store.get(&contact.contact_id) {
            Ok(binding) => binding,
            Err(StoreError::NotFound(id)) => return Err(PipelineError::NoBinding(id)),
            Err(e) => return Err(e.into()),
        };
        info!(
            display_name = %contact.display_name,
            recipient = %binding.recipient_address,
            "Resolved contact binding"
        );
        self.send_transfer(sender, &binding.recipient_address, amount_sol)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockLedgerRpc;
    use solana_sdk::pubkey::Pubkey;
    use std::time::Duration;

    fn pipeline(rpc: Arc<MockLedgerRpc>) -> TransferPipeline {
        TransferPipeline::new(
            rpc,
            ConfirmationPolicy::new(Duration::from_millis(500), Duration::from_secs(5)),
            Cluster::Devnet,
        )
    }

    #[tokio::test]
    async fn test_phase_ends_confirmed_and_guard_released() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let p = pipeline(rpc.clone());
        let phases = p.subscribe();

        let outcome = p
            .send_transfer(Keypair::new(), &Pubkey::new_unique().to_string(), "0.01")
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(*phases.borrow(), TransferPhase::Confirmed);
        assert!(!p.is_busy());
        assert!(!p.cancel_current());
    }

    #[tokio::test]
    async fn test_input_errors_leave_pipeline_idle() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let p = pipeline(rpc.clone());

        let err = p
            .send_transfer(Keypair::new(), "bad", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFormat(_)));
        assert_eq!(p.phase(), TransferPhase::Idle);
        assert_eq!(rpc.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_network_error_aborts_and_releases() {
        let rpc = Arc::new(MockLedgerRpc::new().with_anchor_failure("connection refused"));
        let p = pipeline(rpc.clone());

        let err = p
            .send_transfer(Keypair::new(), &Pubkey::new_unique().to_string(), "1")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Network(_)));
        assert!(err.is_retryable());
        assert_eq!(err.category(), "network");
        assert_eq!(p.phase(), TransferPhase::Aborted);
        assert!(!p.is_busy());
        assert_eq!(rpc.broadcast_calls(), 0);
    }

    #[test]
    fn test_unknown_commitment_is_config_error() {
        let mut config = Config::default();
        config.rpc.commitment = "eventually".to_string();
        let err = match TransferPipeline::from_config(&config) {
            Ok(_) => panic!("unknown commitment accepted"),
            Err(e) => e,
        };
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.category(), "config");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_zero_durations_do_not_panic() {
        let rpc = Arc::new(MockLedgerRpc::new().with_statuses(vec![Ok(None)]));
        let p = TransferPipeline::new(
            rpc.clone(),
            ConfirmationPolicy::new(Duration::ZERO, Duration::from_secs(5)),
            Cluster::Devnet,
        );

        let outcome = p
            .send_transfer(Keypair::new(), &Pubkey::new_unique().to_string(), "0.01")
            .await
            .unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(rpc.status_calls(), 2);
    }

    #[test]
    fn test_error_conversions() {
        let err: PipelineError = BuildError::signing("bad key").into();
        assert!(matches!(err, PipelineError::Signing(_)));
        assert!(!err.is_retryable());

        let err: PipelineError = SubmitError::Serialization("too large".into()).into();
        assert_eq!(err.category(), "serialization");

        assert!(PipelineError::AlreadyInProgress.is_retryable());
    }
}
