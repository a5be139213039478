//! Nullable identity store: thread-safe in-memory storage for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use faceid_store::{IdentityStore, StoreError};
use faceid_types::{AccountKey, ConfirmationToken, IdentityRecord};

/// An in-memory identity store.
///
/// Records live in a single `RwLock`ed vector in insertion order, so readers
/// see either the whole record or none of it.
pub struct NullIdentityStore {
    records: RwLock<Vec<IdentityRecord>>,
    failing: AtomicBool,
}

impl NullIdentityStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with `StoreError::Backend`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store set to fail".to_string()));
        }
        Ok(())
    }
}

impl Default for NullIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for NullIdentityStore {
    fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.write().unwrap();
        if records.iter().any(|r| r.account_key == record.account_key) {
            return Err(StoreError::Duplicate(record.account_key.to_string()));
        }
        records.push(record.clone());
        Ok(())
    }

    fn get_identity(&self, account_key: &AccountKey) -> Result<Option<IdentityRecord>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .find(|r| &r.account_key == account_key)
            .cloned())
    }

    fn exists(&self, account_key: &AccountKey) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .any(|r| &r.account_key == account_key))
    }

    fn identity_count(&self) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.records.read().unwrap().len() as u64)
    }

    fn iter_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        self.check()?;
        Ok(self.records.read().unwrap().clone())
    }

    fn mark_ledger_confirmed(
        &self,
        account_key: &AccountKey,
        token: &ConfirmationToken,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.write().unwrap();
        let record = records
            .iter_mut()
            .find(|r| &r.account_key == account_key)
            .ok_or_else(|| StoreError::NotFound(account_key.to_string()))?;
        record.upgrade_to_ledger(token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceid_types::{AccountId, DescriptorDigest, RegisteredOn, Timestamp};

    fn record(key: &str) -> IdentityRecord {
        IdentityRecord {
            account_id: AccountId::new("id"),
            account_key: AccountKey::new(key),
            descriptor: None,
            digest: DescriptorDigest::ZERO,
            registered_on: RegisteredOn::LocalOnly,
            registered_at: Timestamp::new(0),
            ledger_token: None,
        }
    }

    #[test]
    fn keeps_insertion_order() {
        let store = NullIdentityStore::new();
        store.insert_identity(&record("b")).unwrap();
        store.insert_identity(&record("a")).unwrap();
        let keys: Vec<_> = store
            .iter_identities()
            .unwrap()
            .into_iter()
            .map(|r| r.account_key)
            .collect();
        assert_eq!(keys, vec![AccountKey::new("b"), AccountKey::new("a")]);
    }

    #[test]
    fn rejects_duplicate_key() {
        let store = NullIdentityStore::new();
        store.insert_identity(&record("a")).unwrap();
        assert!(matches!(
            store.insert_identity(&record("a")),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn failing_mode() {
        let store = NullIdentityStore::new();
        store.set_failing(true);
        assert!(matches!(store.exists(&AccountKey::new("a")), Err(StoreError::Backend(_))));
        store.set_failing(false);
        assert!(!store.exists(&AccountKey::new("a")).unwrap());
    }
}
