//! Transfer transaction builder
//!
//! - **amount**: SOL ⇄ lamport conversion with exact integer arithmetic
//! - **errors**: build error taxonomy
//! - **builder**: anchor fetch, System Program transfer, sign, self-verify
//! - **output**: `SignedTransfer`, the signed transaction plus its anchor
//!
//! Every successful build has passed self-verification: exactly one signature,
//! from the fee payer, valid over the serialized message.

pub mod amount;
pub mod errors;

mod builder;
mod output;

pub use amount::{lamports_to_sol, sol_to_lamports, AmountError, LAMPORTS_PER_SOL};
pub use builder::{sign_transfer, verify_fee_payer_signature, TransactionBuilder};
pub use errors::BuildError;
pub use output::SignedTransfer;
