//! In-process digest ledger.
//!
//! Stands in for a local chain node during development: it keeps the
//! registered digests and account keys in memory, charges a fixed cost per
//! registration against a finite budget, and advances the block height by one
//! per accepted registration. `faceid ledger-node` serves it over HTTP.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faceid_crypto::blake2b_256_multi;
use faceid_types::{AccountKey, ConfirmationToken, DescriptorDigest};

use crate::{LedgerClient, LedgerError};

const TX_DOMAIN: &[u8] = b"faceid-ledger-tx";

fn default_registration_cost() -> u64 {
    50_000
}

fn default_budget() -> u64 {
    1_000_000_000
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevLedgerConfig {
    /// Cost charged for each accepted registration.
    #[serde(default = "default_registration_cost")]
    pub registration_cost: u64,
    /// Total funds available for registrations.
    #[serde(default = "default_budget")]
    pub budget: u64,
}

impl Default for DevLedgerConfig {
    fn default() -> Self {
        Self {
            registration_cost: default_registration_cost(),
            budget: default_budget(),
        }
    }
}

#[derive(Default)]
struct DevLedgerState {
    height: u64,
    spent: u64,
    digests: HashSet<DescriptorDigest>,
    accounts: HashMap<AccountKey, DescriptorDigest>,
}

pub struct DevLedger {
    config: DevLedgerConfig,
    state: Mutex<DevLedgerState>,
}

impl Default for DevLedger {
    fn default() -> Self {
        Self::new(DevLedgerConfig::default())
    }
}

impl DevLedger {
    pub fn new(config: DevLedgerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DevLedgerState::default()),
        }
    }

    pub fn config(&self) -> &DevLedgerConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, DevLedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    pub fn remaining_budget(&self) -> u64 {
        self.config.budget.saturating_sub(self.state().spent)
    }

    pub fn registration_count(&self) -> usize {
        self.state().accounts.len()
    }

    pub fn contains_digest(&self, digest: &DescriptorDigest) -> bool {
        self.state().digests.contains(digest)
    }

    pub fn contains_account(&self, account_key: &AccountKey) -> bool {
        self.state().accounts.contains_key(account_key)
    }

    /// Cost of a registration, or `Rejected` if it would revert.
    pub fn estimate(&self, account_key: &AccountKey) -> Result<u64, LedgerError> {
        if self.contains_account(account_key) {
            return Err(LedgerError::Rejected(format!(
                "account '{account_key}' is already registered"
            )));
        }
        Ok(self.config.registration_cost)
    }

    /// Accept a registration, charging its cost and advancing the height.
    pub fn register(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        let mut state = self.state();
        if state.accounts.contains_key(account_key) {
            return Err(LedgerError::Rejected(format!(
                "account '{account_key}' is already registered"
            )));
        }
        let cost = self.config.registration_cost;
        let remaining = self.config.budget.saturating_sub(state.spent);
        if remaining < cost {
            return Err(LedgerError::InsufficientResources(format!(
                "registration costs {cost}, {remaining} remaining"
            )));
        }

        state.spent += cost;
        state.height += 1;
        state.digests.insert(*digest);
        state.accounts.insert(account_key.clone(), *digest);

        let tx = blake2b_256_multi(&[
            TX_DOMAIN,
            &state.height.to_le_bytes(),
            account_key.as_bytes(),
            digest.as_bytes(),
        ]);
        tracing::debug!(account_key = %account_key, height = state.height, "dev ledger accepted registration");
        Ok(ConfirmationToken::new(format!("0x{}", hex::encode(tx))))
    }
}

#[async_trait]
impl LedgerClient for DevLedger {
    async fn block_height(&self) -> Result<u64, LedgerError> {
        Ok(self.height())
    }

    async fn estimate_registration_cost(
        &self,
        account_key: &AccountKey,
        _digest: &DescriptorDigest,
    ) -> Result<u64, LedgerError> {
        self.estimate(account_key)
    }

    async fn submit_registration(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        self.register(account_key, digest)
    }

    async fn digest_registered(&self, digest: &DescriptorDigest) -> Result<bool, LedgerError> {
        Ok(self.contains_digest(digest))
    }

    async fn account_registered(&self, account_key: &AccountKey) -> Result<bool, LedgerError> {
        Ok(self.contains_account(account_key))
    }
}
