//! Local store backend: durable records plus biometric matching.

use std::sync::Arc;

use faceid_matcher::DescriptorMatcher;
use faceid_store::{IdentityStore, StoreError};
use faceid_types::{
    AccountKey, BiometricDescriptor, ConfirmationToken, DescriptorDigest, IdentityRecord,
};

/// The stored record closest to a query, within threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalMatch {
    pub record: IdentityRecord,
    pub distance: f64,
}

pub struct LocalStoreBackend {
    store: Arc<dyn IdentityStore>,
    matcher: DescriptorMatcher,
}

impl LocalStoreBackend {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            matcher: DescriptorMatcher::new(),
        }
    }

    pub fn register_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.store.insert_identity(record)
    }

    /// Best match over every stored record, in registration order.
    ///
    /// `digest` must be the digest of `descriptor`. Records that only carry a
    /// digest match at distance zero when their digest is the same, and are
    /// skipped otherwise. A stored descriptor of a different length than the
    /// query means the store was written under another deployment dimension
    /// and is reported as corruption.
    pub fn verify_identity(
        &self,
        descriptor: &BiometricDescriptor,
        digest: &DescriptorDigest,
    ) -> Result<Option<LocalMatch>, StoreError> {
        let mut records = self.store.iter_identities()?;
        let candidates = records
            .iter()
            .enumerate()
            .filter_map(|(index, r)| match &r.descriptor {
                Some(stored) => Some((index, stored)),
                None if r.digest == *digest => Some((index, descriptor)),
                None => None,
            });

        let best = self
            .matcher
            .find_best_match(descriptor, candidates)
            .map_err(|e| StoreError::Corruption(format!("stored descriptor unusable: {e}")))?;

        Ok(best.map(|m| LocalMatch {
            distance: m.distance,
            record: records.swap_remove(m.id),
        }))
    }

    pub fn identity_exists_by_account(&self, account_key: &AccountKey) -> Result<bool, StoreError> {
        self.store.exists(account_key)
    }

    pub fn find_by_account(
        &self,
        account_key: &AccountKey,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        self.store.get_identity(account_key)
    }

    /// First record, in registration order, stored under exactly `digest`.
    pub fn find_by_digest(
        &self,
        digest: &DescriptorDigest,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self
            .store
            .iter_identities()?
            .into_iter()
            .find(|r| r.digest == *digest))
    }

    pub fn identity_count(&self) -> Result<u64, StoreError> {
        self.store.identity_count()
    }

    /// Records whose ledger write is still outstanding.
    pub fn pending_ledger(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        self.store.iter_local_only()
    }

    pub fn mark_ledger_confirmed(
        &self,
        account_key: &AccountKey,
        token: &ConfirmationToken,
    ) -> Result<(), StoreError> {
        self.store.mark_ledger_confirmed(account_key, token)
    }
}
