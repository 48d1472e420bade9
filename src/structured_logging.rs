//! Structured logging and per-transfer context

use uuid::Uuid;

/// Structured logger for transfer events, tagged with one correlation id
#[derive(Debug, Clone)]
pub struct TransferLogger {
    correlation_id: String,
}

impl TransferLogger {
    pub fn new(correlation_id: String) -> Self {
        Self { correlation_id }
    }

    pub fn log_transfer_attempt(&self, sender: &str, recipient: &str, amount_sol: &str) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            sender = %sender,
            recipient = %recipient,
            amount_sol = %amount_sol,
            "Attempting transfer"
        );
    }

    pub fn log_signed(&self, signature: &str, lamports: u64, last_valid_block_height: u64) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            lamports = %lamports,
            last_valid_block_height = %last_valid_block_height,
            "Transfer signed"
        );
    }

    pub fn log_outcome(&self, signature: &str, status: &str, detail: Option<&str>, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            status = %status,
            detail = ?detail,
            latency_ms = %latency_ms,
            "Transfer finished"
        );
    }

    pub fn log_failure(&self, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Transfer aborted"
        );
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Execution context for one pipeline call
#[derive(Debug, Clone)]
pub struct TransferContext {
    /// Unique request ID
    pub correlation_id: String,

    /// Operation name
    pub operation: String,

    /// Unix timestamp (seconds) at creation
    pub timestamp: i64,

    /// Structured logger instance
    pub logger: TransferLogger,
}

impl TransferContext {
    pub fn new(operation: &str) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        Self {
            correlation_id: correlation_id.clone(),
            operation: operation.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            logger: TransferLogger::new(correlation_id),
        }
    }
}

impl Default for TransferContext {
    fn default() -> Self {
        Self::new("transfer")
    }
}
