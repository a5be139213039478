//! The ledger client seam.

use async_trait::async_trait;

use faceid_types::{AccountKey, ConfirmationToken, DescriptorDigest};

use crate::LedgerError;

/// Raw access to a digest ledger.
///
/// Implementations perform no timeouts or retries of their own beyond what
/// their transport imposes; [`crate::LedgerBackend`] owns the time bounds.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current block height; doubles as a connectivity probe.
    async fn block_height(&self) -> Result<u64, LedgerError>;

    /// Cost of registering `digest` under `account_key`, in ledger units.
    async fn estimate_registration_cost(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<u64, LedgerError>;

    /// Append the registration. Returns the ledger's confirmation token.
    async fn submit_registration(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError>;

    /// Whether exactly this digest has been registered.
    async fn digest_registered(&self, digest: &DescriptorDigest) -> Result<bool, LedgerError>;

    async fn account_registered(&self, account_key: &AccountKey) -> Result<bool, LedgerError>;
}
