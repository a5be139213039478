//! Account identifier derivation.

use faceid_types::{AccountId, AccountKey, DescriptorDigest, Timestamp};

use crate::blake2b_256_multi;

const ACCOUNT_ID_DOMAIN: &[u8] = b"faceid-account";

/// Derive the opaque account id for a new registration.
///
/// First 16 bytes of `Blake2b-256(domain || len(key) || key || digest || registered_at)`,
/// hex encoded. Account keys are unique per store, so ids are too.
pub fn derive_account_id(
    account_key: &AccountKey,
    digest: &DescriptorDigest,
    registered_at: Timestamp,
) -> AccountId {
    let key = account_key.as_bytes();
    let key_len = (key.len() as u64).to_le_bytes();
    let at = registered_at.as_secs().to_le_bytes();
    let hash = blake2b_256_multi(&[ACCOUNT_ID_DOMAIN, &key_len, key, digest.as_bytes(), &at]);
    AccountId::new(hex::encode(&hash[..16]))
}
