//! Identity record storage trait.

use crate::StoreError;
use faceid_types::{AccountKey, ConfirmationToken, IdentityRecord};

/// Durable collection of identity records keyed by account key.
///
/// Implementations must make `insert_identity` atomic: a concurrent reader
/// sees either no record or the complete record, never a partial one.
pub trait IdentityStore: Send + Sync {
    /// Append a new record. Fails with [`StoreError::Duplicate`] if the
    /// account key is already present; the existing record is untouched.
    fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    fn get_identity(&self, account_key: &AccountKey) -> Result<Option<IdentityRecord>, StoreError>;

    fn exists(&self, account_key: &AccountKey) -> Result<bool, StoreError>;

    fn identity_count(&self) -> Result<u64, StoreError>;

    /// All records in registration order.
    fn iter_identities(&self) -> Result<Vec<IdentityRecord>, StoreError>;

    /// Record that a deferred ledger write succeeded for `account_key`.
    ///
    /// This is the only mutation a stored record ever receives.
    fn mark_ledger_confirmed(
        &self,
        account_key: &AccountKey,
        token: &ConfirmationToken,
    ) -> Result<(), StoreError>;

    /// Records still waiting for a ledger write, in registration order.
    fn iter_local_only(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        Ok(self
            .iter_identities()?
            .into_iter()
            .filter(|r| r.registered_on.is_pending_ledger())
            .collect())
    }
}
