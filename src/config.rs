//! Configuration module for contact-pay
//!
//! Loaded from a TOML file, with `.env` and `CONTACT_PAY_*` environment
//! overrides applied on top.

use crate::rpc::SolanaLedgerRpc;
use crate::types::Cluster;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_RPC_URL: &str = "CONTACT_PAY_RPC_URL";
pub const ENV_KEYPAIR: &str = "CONTACT_PAY_KEYPAIR";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger node configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Cluster used for explorer links
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Address binding storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Confirmation polling
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Commitment used for preflight and status lookups; anchors are always finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the binding database
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a terminal status
    #[serde(default = "default_confirmation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Print the metrics registry after each command
    #[serde(default)]
    pub enable_metrics: bool,
}

// Default value functions
fn default_endpoint() -> String { "https://api.devnet.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_commitment() -> String { "finalized".to_string() }
fn default_cluster() -> String { "devnet".to_string() }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_store_path() -> String { "contact-pay.db".to_string() }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_confirmation_timeout() -> u64 { 60 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_rpc_timeout(),
            commitment: default_commitment(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { name: default_cluster() }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { keypair_path: default_keypair_path() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { enable_metrics: false }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            cluster: ClusterConfig::default(),
            wallet: WalletConfig::default(),
            store: StoreConfig::default(),
            confirmation: ConfirmationConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CONTACT_PAY_RPC_URL` and `CONTACT_PAY_KEYPAIR` if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_RPC_URL) {
            if !url.trim().is_empty() {
                self.rpc.endpoint = url;
            }
        }
        if let Ok(path) = std::env::var(ENV_KEYPAIR) {
            if !path.trim().is_empty() {
                self.wallet.keypair_path = path;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            anyhow::bail!("rpc.endpoint must not be empty");
        }
        if SolanaLedgerRpc::parse_commitment(&self.rpc.commitment).is_err() {
            anyhow::bail!(
                "rpc.commitment must be processed, confirmed or finalized, got {:?}",
                self.rpc.commitment
            );
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }
        if self.confirmation.poll_interval_ms == 0 {
            anyhow::bail!("confirmation.poll_interval_ms must be greater than zero");
        }
        if self.confirmation.timeout_secs == 0 {
            anyhow::bail!("confirmation.timeout_secs must be greater than zero");
        }
        if self.poll_interval() >= self.confirmation_timeout() {
            anyhow::bail!(
                "confirmation.poll_interval_ms ({}) must be below confirmation.timeout_secs ({})",
                self.confirmation.poll_interval_ms,
                self.confirmation.timeout_secs
            );
        }
        Ok(())
    }

    pub fn cluster(&self) -> Cluster {
        Cluster::from_name(&self.cluster.name, &self.rpc.endpoint)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation.timeout_secs)
    }
}
