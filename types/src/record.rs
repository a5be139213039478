//! Identity records and the backend enums attached to them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountId, AccountKey, BiometricDescriptor, ConfirmationToken, DescriptorDigest, Timestamp};

/// Where a registration has been durably recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisteredOn {
    /// Confirmed on the ledger (and always also stored locally).
    Ledger,
    /// Stored locally only; the ledger write failed or has not been attempted yet.
    LocalOnly,
}

impl RegisteredOn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::LocalOnly => "local_only",
        }
    }

    /// Whether a deferred ledger write is still outstanding.
    pub fn is_pending_ledger(&self) -> bool {
        matches!(self, Self::LocalOnly)
    }
}

impl fmt::Display for RegisteredOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names the backend that confirmed a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Ledger,
    LocalStore,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::LocalStore => "local_store",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub account_id: AccountId,
    pub account_key: AccountKey,
    /// Raw descriptor; absent when only the digest is retained.
    pub descriptor: Option<BiometricDescriptor>,
    pub digest: DescriptorDigest,
    pub registered_on: RegisteredOn,
    pub registered_at: Timestamp,
    /// Ledger confirmation, present iff `registered_on == Ledger`.
    #[serde(default)]
    pub ledger_token: Option<ConfirmationToken>,
}

impl IdentityRecord {
    /// Apply the one permitted mutation: a deferred ledger write succeeded.
    pub fn upgrade_to_ledger(&mut self, token: ConfirmationToken) {
        self.registered_on = RegisteredOn::Ledger;
        self.ledger_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> IdentityRecord {
        IdentityRecord {
            account_id: AccountId::new("00ff"),
            account_key: AccountKey::new("a@x.com"),
            descriptor: Some(BiometricDescriptor::new(vec![0.25; 4]).unwrap()),
            digest: DescriptorDigest::new([3u8; 32]),
            registered_on: RegisteredOn::LocalOnly,
            registered_at: Timestamp::new(1_700_000_000),
            ledger_token: None,
        }
    }

    #[test]
    fn upgrade_sets_token() {
        let mut r = record();
        assert!(r.registered_on.is_pending_ledger());
        r.upgrade_to_ledger(ConfirmationToken::new("tx1"));
        assert_eq!(r.registered_on, RegisteredOn::Ledger);
        assert_eq!(r.ledger_token.as_ref().map(|t| t.as_str()), Some("tx1"));
    }

    #[test]
    fn record_bincode_round_trip() {
        let r = record();
        let bytes = bincode::serialize(&r).unwrap();
        let back: IdentityRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn registered_on_json_names() {
        assert_eq!(
            serde_json::to_string(&RegisteredOn::LocalOnly).unwrap(),
            "\"local_only\""
        );
        assert_eq!(serde_json::to_string(&Backend::LocalStore).unwrap(), "\"local_store\"");
    }
}
