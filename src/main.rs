//! contact-pay command line
//!
//! Manage contact address bindings and send SOL to a contact or address.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contact_pay::metrics::metrics;
use contact_pay::wallet::load_keypair;
use contact_pay::{AddressBindingStore, Config, Contact, TransactionOutcome, TransferPipeline};
use solana_sdk::signature::{Signature, Signer};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bind a recipient address to a contact
    Bind { contact: String, address: String },

    /// Show the address bound to a contact
    Show { contact: String },

    /// List all bindings
    List,

    /// Remove a contact's binding
    Unbind { contact: String },

    /// Send SOL to an address or a bound contact
    Send {
        /// Recipient address
        #[arg(long, conflicts_with = "contact", required_unless_present = "contact")]
        to: Option<String>,

        /// Contact whose bound address receives the transfer
        #[arg(long)]
        contact: Option<String>,

        /// Amount in SOL, e.g. 0.01
        #[arg(long)]
        amount: String,

        /// Keypair file, overrides the configured wallet
        #[arg(long, env = "CONTACT_PAY_KEYPAIR")]
        keypair: Option<String>,
    },

    /// Look up a transfer by signature
    Status { signature: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    match args.command {
        Command::Bind { contact, address } => {
            let store = open_store(&config)?;
            let binding = store
                .set(&contact, &address)
                .with_context(|| format!("Failed to bind address for {}", contact))?;
            println!("{} -> {}", binding.contact_id, binding.recipient_address);
        }
        Command::Show { contact } => {
            let store = open_store(&config)?;
            let binding = store.get(&contact)?;
            println!("{} -> {}", binding.contact_id, binding.recipient_address);
        }
        Command::List => {
            let store = open_store(&config)?;
            for binding in store.list()? {
                println!("{} -> {}", binding.contact_id, binding.recipient_address);
            }
        }
        Command::Unbind { contact } => {
            let store = open_store(&config)?;
            if store.remove(&contact)? {
                println!("Removed binding for {}", contact);
            } else {
                println!("No binding for {}", contact);
            }
        }
        Command::Send {
            to,
            contact,
            amount,
            keypair,
        } => {
            let keypair_path = keypair.unwrap_or_else(|| config.wallet.keypair_path.clone());
            let sender = load_keypair(&keypair_path).context("Failed to load wallet")?;
            info!(sender = %sender.pubkey(), endpoint = %config.rpc.endpoint, "Wallet loaded");

            let pipeline = Arc::new(TransferPipeline::from_config(&config)?);
            spawn_cancel_on_ctrl_c(pipeline.clone());

            let outcome = match (to, contact) {
                (Some(address), _) => pipeline.send_transfer(sender, &address, &amount).await?,
                (None, Some(contact_id)) => {
                    let store = open_store(&config)?;
                    let contact = Contact::new(contact_id.clone(), contact_id);
                    pipeline
                        .send_to_contact(sender, &store, &contact, &amount)
                        .await?
                }
                (None, None) => anyhow::bail!("Either --to or --contact is required"),
            };
            print_outcome(&outcome);
        }
        Command::Status { signature } => {
            let signature = Signature::from_str(&signature)
                .with_context(|| format!("Invalid signature: {}", signature))?;
            let pipeline = TransferPipeline::from_config(&config)?;
            print_outcome(&pipeline.query_status(&signature).await?);
        }
    }

    if config.monitoring.enable_metrics {
        println!("{}", metrics().render()?);
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "contact_pay=debug,info"
    } else {
        "contact_pay=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn open_store(config: &Config) -> Result<AddressBindingStore> {
    AddressBindingStore::open(&config.store.path)
        .with_context(|| format!("Failed to open binding store at {}", config.store.path))
}

/// Stop waiting for confirmation on Ctrl-C; the transfer reports `TimedOut`
fn spawn_cancel_on_ctrl_c(pipeline: Arc<TransferPipeline>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && pipeline.cancel_current() {
            warn!("Cancelled confirmation wait; the transfer may still land");
        }
    });
}

fn print_outcome(outcome: &TransactionOutcome) {
    println!("Signature: {}", outcome.signature);
    println!("Status:    {}", outcome.status);
    if let Some(detail) = &outcome.error_detail {
        println!("Detail:    {}", detail);
    }
    println!("Explorer:  {}", outcome.explorer_url);
    if outcome.is_confirmed() {
        println!("Transaction Complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_recipient() {
        assert!(Args::try_parse_from(["contact-pay", "send", "--amount", "0.01"]).is_err());
        assert!(Args::try_parse_from([
            "contact-pay", "send", "--to", "a", "--contact", "b", "--amount", "1"
        ])
        .is_err());

        let args = Args::try_parse_from(["contact-pay", "send", "--contact", "42", "--amount", "0.01"])
            .unwrap();
        assert!(matches!(args.command, Command::Send { contact: Some(_), .. }));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config("/nonexistent/contact-pay.toml").unwrap();
        assert!(config.validate().is_ok());
    }
}
