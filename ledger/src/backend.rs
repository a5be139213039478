//! Timeout-bounded adapter over a [`LedgerClient`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use faceid_types::{AccountKey, ConfirmationToken, DescriptorDigest};

use crate::{LedgerClient, LedgerError};

/// Time bounds for ledger calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerTimeouts {
    /// Read calls: verify, exists, height.
    pub call: Duration,
    /// The whole registration: cost estimate plus submission.
    pub register: Duration,
}

impl Default for LedgerTimeouts {
    fn default() -> Self {
        Self {
            call: Duration::from_millis(2_000),
            register: Duration::from_millis(3_000),
        }
    }
}

/// Result of a connectivity probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub reachable: bool,
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LedgerBackend {
    client: Arc<dyn LedgerClient>,
    timeouts: LedgerTimeouts,
    max_registration_cost: Option<u64>,
}

impl LedgerBackend {
    pub fn new(client: Arc<dyn LedgerClient>, timeouts: LedgerTimeouts) -> Self {
        Self {
            client,
            timeouts,
            max_registration_cost: None,
        }
    }

    /// Refuse registrations whose estimated cost exceeds `max`.
    pub fn with_max_registration_cost(mut self, max: Option<u64>) -> Self {
        self.max_registration_cost = max;
        self
    }

    pub fn timeouts(&self) -> LedgerTimeouts {
        self.timeouts
    }

    async fn bounded<T, F>(&self, limit: Duration, op: &str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Unavailable(format!(
                "{op} timed out after {} ms",
                limit.as_millis()
            ))),
        }
    }

    /// Register `digest` under `account_key`.
    ///
    /// Estimates the cost first. An estimate that fails for any reason other
    /// than unavailability, or that exceeds the configured maximum, is
    /// reported as `InsufficientResources` without submitting. The ledger
    /// performs no biometric uniqueness check of its own.
    pub async fn register_identity(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        self.bounded(
            self.timeouts.register,
            "registration",
            self.estimate_and_submit(account_key, digest),
        )
        .await
    }

    async fn estimate_and_submit(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        let cost = self
            .client
            .estimate_registration_cost(account_key, digest)
            .await
            .map_err(|e| match e {
                LedgerError::Unavailable(_) => e,
                other => {
                    LedgerError::InsufficientResources(format!("cost estimate failed: {other}"))
                }
            })?;
        if let Some(max) = self.max_registration_cost {
            if cost > max {
                return Err(LedgerError::InsufficientResources(format!(
                    "estimated cost {cost} exceeds limit {max}"
                )));
            }
        }
        self.client.submit_registration(account_key, digest).await
    }

    /// Whether exactly `digest` is on the ledger.
    pub async fn verify_identity(&self, digest: &DescriptorDigest) -> Result<bool, LedgerError> {
        self.bounded(self.timeouts.call, "verify", self.client.digest_registered(digest))
            .await
    }

    pub async fn identity_exists_by_account(
        &self,
        account_key: &AccountKey,
    ) -> Result<bool, LedgerError> {
        self.bounded(
            self.timeouts.call,
            "exists",
            self.client.account_registered(account_key),
        )
        .await
    }

    /// Probe the ledger by reading its block height.
    pub async fn status(&self) -> LedgerStatus {
        match self
            .bounded(self.timeouts.call, "block height", self.client.block_height())
            .await
        {
            Ok(height) => LedgerStatus {
                reachable: true,
                block_height: Some(height),
                error: None,
            },
            Err(e) => LedgerStatus {
                reachable: false,
                block_height: None,
                error: Some(e.to_string()),
            },
        }
    }
}
