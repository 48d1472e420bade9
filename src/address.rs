//! Recipient address validation
//!
//! Addresses are base-58 encoded ed25519 public keys. A 32-byte key encodes
//! to between 32 and 44 characters of the bitcoin base-58 alphabet.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Raw public key length in bytes
pub const PUBKEY_BYTES: usize = 32;

/// Shortest base-58 encoding of a 32-byte key
pub const MIN_ADDRESS_LEN: usize = 32;

/// Longest base-58 encoding of a 32-byte key
pub const MAX_ADDRESS_LEN: usize = 44;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,

    #[error("Address length {len} outside 32..=44")]
    BadLength { len: usize },

    #[error("Invalid character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("Address decodes to {len} bytes, expected 32")]
    BadDecodedLength { len: usize },
}

/// Validate a recipient address and return the parsed public key.
///
/// Pure; performs no I/O. Leading or trailing whitespace makes the address
/// invalid rather than being trimmed.
pub fn validate_address(address: &str) -> Result<Pubkey, AddressError> {
    if address.trim().is_empty() {
        return Err(AddressError::Empty);
    }

    if let Some((position, ch)) = address
        .chars()
        .enumerate()
        .find(|(_, c)| !BASE58_ALPHABET.contains(*c))
    {
        return Err(AddressError::InvalidCharacter { ch, position });
    }

    // Alphabet is pure ASCII, so byte length equals char count here
    let len = address.len();
    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
        return Err(AddressError::BadLength { len });
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::BadDecodedLength { len: 0 })?;
    let key: [u8; PUBKEY_BYTES] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AddressError::BadDecodedLength { len: bytes.len() })?;

    Ok(Pubkey::new_from_array(key))
}

/// Convenience predicate over [`validate_address`]
pub fn is_valid_address(address: &str) -> bool {
    validate_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_generated_pubkeys() {
        for _ in 0..32 {
            let key = Pubkey::new_unique();
            assert_eq!(validate_address(&key.to_string()), Ok(key));
        }
    }

    #[test]
    fn test_accepts_known_addresses() {
        // System program: all-zero key, shortest possible encoding
        assert!(is_valid_address("11111111111111111111111111111111"));
        assert!(is_valid_address("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"));
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(validate_address(""), Err(AddressError::Empty));
        assert_eq!(validate_address("   \t"), Err(AddressError::Empty));

        let padded = format!(" {} ", Pubkey::new_unique());
        assert!(matches!(
            validate_address(&padded),
            Err(AddressError::InvalidCharacter { ch: ' ', position: 0 })
        ));
    }

    #[test]
    fn test_rejects_bad_alphabet() {
        assert!(matches!(
            validate_address("not-a-real-address"),
            Err(AddressError::InvalidCharacter { ch: '-', .. })
        ));
        // 0, O, I and l are excluded from base-58
        let mut addr = Pubkey::new_unique().to_string();
        addr.replace_range(0..1, "0");
        assert!(matches!(
            validate_address(&addr),
            Err(AddressError::InvalidCharacter { ch: '0', position: 0 })
        ));
    }

    #[test]
    fn test_rejects_bad_length() {
        assert_eq!(
            validate_address("abc"),
            Err(AddressError::BadLength { len: 3 })
        );
        let long = "2".repeat(45);
        assert_eq!(
            validate_address(&long),
            Err(AddressError::BadLength { len: 45 })
        );
    }

    #[test]
    fn test_rejects_wrong_decoded_size() {
        // 44 'z' characters decode to more than 32 bytes
        let oversized = "z".repeat(44);
        assert!(matches!(
            validate_address(&oversized),
            Err(AddressError::BadDecodedLength { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_any_32_byte_key_is_valid(bytes in proptest::array::uniform32(any::<u8>())) {
            let encoded = bs58::encode(bytes).into_string();
            let parsed = validate_address(&encoded);
            prop_assert_eq!(parsed, Ok(Pubkey::new_from_array(bytes)));
        }

        #[test]
        fn prop_non_alphabet_chars_rejected(
            prefix in "[1-9A-HJ-NP-Za-km-z]{10,20}",
            bad in "[0OIl+/=_-]",
            suffix in "[1-9A-HJ-NP-Za-km-z]{10,20}",
        ) {
            let candidate = format!("{}{}{}", prefix, bad, suffix);
            let is_invalid_char = matches!(
                validate_address(&candidate),
                Err(AddressError::InvalidCharacter { .. })
            );
            prop_assert!(is_invalid_char);
        }
    }
}
