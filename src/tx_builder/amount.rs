//! Major/minor unit conversion for the native asset
//!
//! Amounts arrive as decimal strings (user text input) and are converted with
//! exact integer arithmetic; no floating point is involved.

use thiserror::Error;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Fractional digits representable in lamports
pub const SOL_DECIMALS: usize = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Amount is not a decimal number: {0:?}")]
    Malformed(String),

    #[error("Amount must be greater than zero")]
    NonPositive,

    #[error("Amount has {digits} fractional digits, at most 9 are representable")]
    TooPrecise { digits: usize },

    #[error("Amount exceeds the maximum representable lamports")]
    Overflow,
}

/// Convert a SOL amount such as `"1.5"` into lamports.
///
/// Accepts an optional integer part, an optional fraction, and surrounding
/// whitespace. Trailing zeros beyond nine fractional digits are accepted;
/// any other sub-lamport precision is rejected.
pub fn sol_to_lamports(input: &str) -> Result<u64, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::NonPositive);
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }

    let significant = fraction.trim_end_matches('0');
    if significant.len() > SOL_DECIMALS {
        return Err(AmountError::TooPrecise {
            digits: significant.len(),
        });
    }

    let whole_lamports = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| AmountError::Overflow)?
            .checked_mul(LAMPORTS_PER_SOL)
            .ok_or(AmountError::Overflow)?
    };

    let fraction_lamports = if significant.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", significant, width = SOL_DECIMALS);
        padded
            .parse::<u64>()
            .map_err(|_| AmountError::Malformed(trimmed.to_string()))?
    };

    let lamports = whole_lamports
        .checked_add(fraction_lamports)
        .ok_or(AmountError::Overflow)?;

    if lamports == 0 {
        return Err(AmountError::NonPositive);
    }
    Ok(lamports)
}

/// Render lamports as a SOL decimal string without trailing zeros
pub fn lamports_to_sol(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let fraction = lamports % LAMPORTS_PER_SOL;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = SOL_DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
