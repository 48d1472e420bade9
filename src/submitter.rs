//! Broadcast and confirmation of signed transfers
//!
//! One broadcast per call, then a bounded status poll. The poll ends on a
//! finalized status, a node-reported execution error, the confirmation
//! timeout, or a cancel signal. Nothing is ever resubmitted.

use crate::metrics::{metrics, Timer};
use crate::rpc::{LedgerRpc, LedgerRpcError, SignatureState};
use crate::tx_builder::{BuildError, SignedTransfer};
use crate::types::{Cluster, RejectionReason, TransactionOutcome, TransferPhase, TransferStatus};
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug, Clone)]
pub enum SubmitError {
    /// The broadcast never reached a node, or the node's answer was unusable
    #[error("Network error during broadcast: {0}")]
    Network(LedgerRpcError),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Serialization(_) => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Floor applied to both polling durations
pub const MIN_POLL_DURATION: Duration = Duration::from_millis(1);

/// Confirmation polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Treat `confirmed` (not yet rooted) as terminal success
    pub accept_confirmed: bool,
}

impl ConfirmationPolicy {
    /// Zero durations are raised to [`MIN_POLL_DURATION`]
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_DURATION),
            timeout: timeout.max(MIN_POLL_DURATION),
            accept_confirmed: false,
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(60))
    }
}

/// Cloneable one-shot cancel signal for a confirmation poll
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TransactionSubmitter {
    rpc: Arc<dyn LedgerRpc>,
    policy: ConfirmationPolicy,
    cluster: Cluster,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, policy: ConfirmationPolicy, cluster: Cluster) -> Self {
        Self {
            rpc,
            policy,
            cluster,
        }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Broadcast `transfer` and wait for a terminal status
    pub async fn submit(
        &self,
        transfer: &SignedTransfer,
        cancel: &CancelToken,
    ) -> Result<TransactionOutcome, SubmitError> {
        self.submit_reporting(transfer, cancel, |_| {}).await
    }

    /// Like [`submit`](Self::submit), calling `on_phase` with `Broadcasting`
    /// and then `Confirming` as the transfer moves along
    #[instrument(
        skip(self, transfer, cancel, on_phase),
        fields(signature = %transfer.signature(), endpoint = self.rpc.endpoint())
    )]
    pub async fn submit_reporting<F>(
        &self,
        transfer: &SignedTransfer,
        cancel: &CancelToken,
        on_phase: F,
    ) -> Result<TransactionOutcome, SubmitError>
    where
        F: Fn(TransferPhase) + Send + Sync,
    {
        let wire = transfer.wire_bytes().map_err(|e| match e {
            BuildError::Serialization(msg) => SubmitError::Serialization(msg),
            other => SubmitError::Serialization(other.to_string()),
        })?;
        let signature = transfer.signature();

        on_phase(TransferPhase::Broadcasting);
        match self.rpc.send_raw_transaction(&wire).await {
            Ok(reported) => {
                if reported != signature {
                    warn!(expected = %signature, reported = %reported, "Node reported a different signature");
                }
                info!(bytes = wire.len(), "Transfer broadcast accepted");
            }
            Err(LedgerRpcError::Rejected { reason, message, .. }) => {
                if reason == RejectionReason::AlreadyProcessed {
                    info!("Node already holds this transaction, polling existing signature");
                } else {
                    warn!(reason = ?reason, detail = %message, "Broadcast rejected by node");
                    return Ok(TransactionOutcome::new(&signature, TransferStatus::Failed, &self.cluster)
                        .with_detail(message)
                        .with_rejection(reason));
                }
            }
            Err(e) => {
                warn!(error = %e, "Broadcast failed before reaching the node");
                return Err(SubmitError::Network(e));
            }
        }

        on_phase(TransferPhase::Confirming);
        Ok(self.confirm(signature, cancel).await)
    }

    /// Poll `signature` until it reaches a terminal status
    #[instrument(skip(self, cancel), fields(signature = %signature))]
    pub async fn confirm(&self, signature: Signature, cancel: &CancelToken) -> TransactionOutcome {
        let timer = Timer::with_name("confirmation_latency_seconds");
        let deadline = Instant::now() + self.policy.timeout;
        // Public fields can bypass `new`
        let mut interval = tokio::time::interval(self.policy.poll_interval.max(MIN_POLL_DURATION));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break self.timed_out(&signature, "confirmation polling cancelled");
                }
                _ = tokio::time::sleep_until(deadline) => {
                    break self.timed_out(&signature, format!(
                        "no terminal status within {}s",
                        self.policy.timeout.as_secs()
                    ));
                }
                _ = interval.tick() => {}
            }

            attempts += 1;
            metrics().poll_attempts.inc();

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break self.timed_out(&signature, "confirmation polling cancelled");
                }
                polled = tokio::time::timeout_at(deadline, self.rpc.signature_status(&signature)) => polled,
            };

            match polled {
                // Deadline hit mid-request; the next turn reports the timeout
                Err(_) => continue,
                Ok(Ok(Some(SignatureState::Finalized))) => {
                    break TransactionOutcome::new(&signature, TransferStatus::Confirmed, &self.cluster);
                }
                Ok(Ok(Some(SignatureState::Confirmed))) if self.policy.accept_confirmed => {
                    break TransactionOutcome::new(&signature, TransferStatus::Confirmed, &self.cluster);
                }
                Ok(Ok(Some(SignatureState::Failed(detail)))) => {
                    let reason = RejectionReason::classify(&detail);
                    break TransactionOutcome::new(&signature, TransferStatus::Failed, &self.cluster)
                        .with_detail(detail)
                        .with_rejection(reason);
                }
                Ok(Ok(state)) => {
                    debug!(attempts, state = ?state, "Not yet final");
                }
                Ok(Err(e)) => {
                    warn!(attempts, error = %e, "Status poll failed, continuing");
                }
            }
        };

        timer.finish();
        info!(attempts, status = %outcome.status, "Confirmation finished");
        outcome
    }

    /// Single status lookup, for re-querying a transfer that timed out.
    ///
    /// Returns `Pending` while the node has no terminal answer.
    pub async fn query_status(&self, signature: &Signature) -> Result<TransactionOutcome, SubmitError> {
        let state = self
            .rpc
            .signature_status(signature)
            .await
            .map_err(SubmitError::Network)?;

        let outcome = match state {
            Some(SignatureState::Finalized) => {
                TransactionOutcome::new(signature, TransferStatus::Confirmed, &self.cluster)
            }
            Some(SignatureState::Confirmed) if self.policy.accept_confirmed => {
                TransactionOutcome::new(signature, TransferStatus::Confirmed, &self.cluster)
            }
            Some(SignatureState::Failed(detail)) => {
                let reason = RejectionReason::classify(&detail);
                TransactionOutcome::new(signature, TransferStatus::Failed, &self.cluster)
                    .with_detail(detail)
                    .with_rejection(reason)
            }
            _ => TransactionOutcome::new(signature, TransferStatus::Pending, &self.cluster),
        };
        Ok(outcome)
    }

    fn timed_out(&self, signature: &Signature, detail: impl Into<String>) -> TransactionOutcome {
        TransactionOutcome::new(signature, TransferStatus::TimedOut, &self.cluster).with_detail(detail)
    }
}
