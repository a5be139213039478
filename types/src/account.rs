//! Account identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest account key accepted, in bytes. Keys index the LMDB store, whose
/// key size limit is 511 bytes.
pub const MAX_ACCOUNT_KEY_LEN: usize = 256;

/// The user-chosen key an identity is registered under (typically an email).
///
/// Case-sensitive and compared byte-for-byte: `A@x.com` and `a@x.com` are
/// different keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// A key is well-formed when it is non-empty, at most
    /// [`MAX_ACCOUNT_KEY_LEN`] bytes, and carries no surrounding whitespace.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= MAX_ACCOUNT_KEY_LEN && self.0.trim() == self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Opaque identifier assigned to an account at registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
