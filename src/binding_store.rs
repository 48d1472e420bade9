//! Durable contact → recipient address bindings
//!
//! Backed by a sled tree. Each binding is one JSON record under the key
//! `binding:<contact_id>`; writes are single-key and flushed before `set`
//! returns, so a binding survives a restart once the call succeeds.

use crate::address::{validate_address, AddressError};
use crate::metrics::metrics;
use crate::types::AddressBinding;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const KEY_PREFIX: &str = "binding:";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid recipient address: {0}")]
    InvalidFormat(#[from] AddressError),

    #[error("Contact id must not be empty")]
    InvalidContactId,

    #[error("No address bound for contact {0}")]
    NotFound(String),

    #[error("Corrupt binding record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub struct AddressBindingStore {
    db: sled::Db,
}

impl std::fmt::Debug for AddressBindingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressBindingStore")
            .field("bindings", &self.db.scan_prefix(KEY_PREFIX).count())
            .finish()
    }
}

impl AddressBindingStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened address binding store");
        Ok(Self { db })
    }

    /// In-memory store discarded on drop
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn key(contact_id: &str) -> Result<String, StoreError> {
        if contact_id.trim().is_empty() {
            return Err(StoreError::InvalidContactId);
        }
        Ok(format!("{}{}", KEY_PREFIX, contact_id))
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<AddressBinding, StoreError> {
        serde_json::from_slice(value).map_err(|e| StoreError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })
    }

    pub fn get(&self, contact_id: &str) -> Result<AddressBinding, StoreError> {
        let key = Self::key(contact_id)?;
        match self.db.get(key.as_bytes())? {
            Some(value) => Self::decode(key.as_bytes(), &value),
            None => Err(StoreError::NotFound(contact_id.to_string())),
        }
    }

    /// Bind `address` to `contact_id`, replacing any earlier binding.
    ///
    /// The address is validated first; nothing is written if it is malformed.
    pub fn set(&self, contact_id: &str, address: &str) -> Result<AddressBinding, StoreError> {
        let key = Self::key(contact_id)?;
        validate_address(address)?;

        let binding = AddressBinding {
            contact_id: contact_id.to_string(),
            recipient_address: address.to_string(),
            updated_at: chrono::Utc::now().timestamp(),
        };
        let value = serde_json::to_vec(&binding).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let previous = self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        metrics().bindings_written.inc();

        debug!(
            contact_id = %contact_id,
            recipient = %address,
            replaced = previous.is_some(),
            "Address binding written"
        );
        Ok(binding)
    }

    pub fn has(&self, contact_id: &str) -> Result<bool, StoreError> {
        let key = Self::key(contact_id)?;
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    /// Remove a binding; returns whether one existed
    pub fn remove(&self, contact_id: &str) -> Result<bool, StoreError> {
        let key = Self::key(contact_id)?;
        let removed = self.db.remove(key.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(removed)
    }

    /// All bindings, ordered by contact id
    pub fn list(&self) -> Result<Vec<AddressBinding>, StoreError> {
        self.db
            .scan_prefix(KEY_PREFIX)
            .map(|entry| {
                let (key, value) = entry?;
                Self::decode(&key, &value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn addr() -> String {
        Pubkey::new_unique().to_string()
    }

    #[test]
    fn test_read_after_write() {
        let store = AddressBindingStore::temporary().unwrap();
        let address = addr();

        assert!(!store.has("contact-42").unwrap());
        store.set("contact-42", &address).unwrap();

        assert!(store.has("contact-42").unwrap());
        let binding = store.get("contact-42").unwrap();
        assert_eq!(binding.contact_id, "contact-42");
        assert_eq!(binding.recipient_address, address);
    }

    #[test]
    fn test_last_write_wins() {
        let store = AddressBindingStore::temporary().unwrap();
        let first = addr();
        let second = addr();

        store.set("contact-42", &first).unwrap();
        store.set("contact-42", &second).unwrap();

        assert_eq!(store.get("contact-42").unwrap().recipient_address, second);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_address_is_not_persisted() {
        let store = AddressBindingStore::temporary().unwrap();
        let original = addr();
        store.set("contact-7", &original).unwrap();

        let err = store.set("contact-7", "not-a-real-address").unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat(_)));
        assert_eq!(store.get("contact-7").unwrap().recipient_address, original);

        assert!(matches!(
            store.set("contact-8", "   ").unwrap_err(),
            StoreError::InvalidFormat(AddressError::Empty)
        ));
        assert!(!store.has("contact-8").unwrap());
    }

    #[test]
    fn test_not_found_and_empty_id() {
        let store = AddressBindingStore::temporary().unwrap();
        assert!(store.get("missing").unwrap_err().is_not_found());
        assert!(matches!(
            store.set("", &addr()).unwrap_err(),
            StoreError::InvalidContactId
        ));
    }

    #[test]
    fn test_remove_and_list() {
        let store = AddressBindingStore::temporary().unwrap();
        store.set("b", &addr()).unwrap();
        store.set("a", &addr()).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|b| b.contact_id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.db");
        let address = addr();

        {
            let store = AddressBindingStore::open(&path).unwrap();
            store.set("contact-42", &address).unwrap();
        }

        let reopened = AddressBindingStore::open(&path).unwrap();
        assert_eq!(reopened.get("contact-42").unwrap().recipient_address, address);
    }
}
