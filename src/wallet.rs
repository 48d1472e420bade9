//! Sender keypair loading
//!
//! Keys are loaded per command and handed to the pipeline by value; nothing
//! here caches key material.

use anyhow::{Context, Result};
use solana_sdk::signature::Keypair;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const KEYPAIR_BYTES: usize = 64;

/// Load a keypair file: a JSON array of 64 bytes (the Solana CLI format),
/// 64 raw bytes, or a base-58 encoded secret key.
pub fn load_keypair(path: &str) -> Result<Keypair> {
    let path = expand_home(path);
    let raw = Zeroizing::new(
        std::fs::read(&path)
            .with_context(|| format!("Failed to read keypair file: {}", path.display()))?,
    );

    if raw.len() == KEYPAIR_BYTES {
        return keypair_from_bytes(&raw);
    }

    let text = std::str::from_utf8(&raw).context("Keypair file is not valid UTF-8")?;
    let text = text.trim();
    if text.starts_with('[') {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(text).context("Failed to parse keypair JSON")?,
        );
        keypair_from_bytes(&bytes)
    } else {
        keypair_from_base58(text)
    }
}

/// Decode a base-58 encoded 64-byte secret key
pub fn keypair_from_base58(encoded: &str) -> Result<Keypair> {
    let bytes = Zeroizing::new(
        bs58::decode(encoded.trim())
            .into_vec()
            .context("Failed to decode base-58 keypair")?,
    );
    keypair_from_bytes(&bytes)
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != KEYPAIR_BYTES {
        anyhow::bail!(
            "Invalid keypair length: expected {} bytes, got {}",
            KEYPAIR_BYTES,
            bytes.len()
        );
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;
    use std::io::Write;

    #[test]
    fn test_load_json_keypair() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = load_keypair(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_load_base58_keypair() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", keypair.to_base58_string()).unwrap();

        let loaded = load_keypair(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_all_zero_and_short_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        let err = load_keypair(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("all-zero"));

        assert!(keypair_from_base58("3yZe7d").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_keypair("/nonexistent/keypair.json").is_err());
    }
}
