//! Reconciles the ledger and the local store into one decision.
//!
//! Each read operation walks `TryLedger -> TryLocal -> Done`. The ledger is
//! consulted first; a positive ledger answer is final, while a negative
//! answer or any ledger error falls through to the local store. Ledger
//! errors never escape this module; local store errors always do.

use std::sync::Arc;

use faceid_crypto::derive_account_id;
use faceid_ledger::{LedgerBackend, LedgerError, LedgerStatus};
use faceid_store::StoreError;
use faceid_types::{
    AccountKey, BiometricDescriptor, DescriptorDigest, IdentityRecord, RegisteredOn, Timestamp,
};
use serde::Serialize;

use crate::local::{LocalMatch, LocalStoreBackend};
use crate::metrics::EngineMetrics;

/// Outcome of a resolved read.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
    LedgerConfirmed,
    LocalConfirmed(T),
    NotFound,
}

/// Resolver state for one operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Step<T> {
    TryLedger,
    TryLocal,
    Done(Resolution<T>),
}

impl<T> Step<T> {
    fn name(&self) -> &'static str {
        match self {
            Step::TryLedger => "try_ledger",
            Step::TryLocal => "try_local",
            Step::Done(_) => "done",
        }
    }
}

/// Result of replaying `local_only` records to the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Ledger registrations attempted.
    pub attempted: usize,
    /// Records upgraded to `ledger`.
    pub upgraded: usize,
    /// Records still `local_only` afterwards.
    pub pending: usize,
}

pub struct BackendResolver {
    ledger: Option<LedgerBackend>,
    local: LocalStoreBackend,
    metrics: Arc<EngineMetrics>,
}

impl BackendResolver {
    pub fn new(
        ledger: Option<LedgerBackend>,
        local: LocalStoreBackend,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            ledger,
            local,
            metrics,
        }
    }

    pub fn local(&self) -> &LocalStoreBackend {
        &self.local
    }

    fn absorb(&self, operation: &'static str, error: &LedgerError) {
        tracing::warn!(operation, %error, "ledger call failed, falling back to local store");
        self.metrics
            .ledger_fallbacks
            .with_label_values(&[operation])
            .inc();
    }

    /// Biometric verification: exact digest on the ledger, else nearest
    /// neighbour in the local store.
    pub async fn verify(
        &self,
        digest: &DescriptorDigest,
        descriptor: &BiometricDescriptor,
    ) -> Result<Resolution<LocalMatch>, StoreError> {
        let mut step = Step::TryLedger;
        loop {
            step = match step {
                Step::TryLedger => match &self.ledger {
                    None => Step::TryLocal,
                    Some(ledger) => match ledger.verify_identity(digest).await {
                        Ok(true) => Step::Done(Resolution::LedgerConfirmed),
                        Ok(false) => Step::TryLocal,
                        Err(e) => {
                            self.absorb("verify", &e);
                            Step::TryLocal
                        }
                    },
                },
                Step::TryLocal => match self.local.verify_identity(descriptor, digest)? {
                    Some(found) => {
                        tracing::debug!(
                            account_key = %found.record.account_key,
                            distance = found.distance,
                            "local store match"
                        );
                        Step::Done(Resolution::LocalConfirmed(found))
                    }
                    None => Step::Done(Resolution::NotFound),
                },
                Step::Done(resolution) => return Ok(resolution),
            };
            tracing::debug!(step = step.name(), "verify resolver step");
        }
    }

    /// Account lookup: the ledger's answer if positive, else the local store's.
    pub async fn exists(&self, account_key: &AccountKey) -> Result<Resolution<()>, StoreError> {
        let mut step = Step::TryLedger;
        loop {
            step = match step {
                Step::TryLedger => match &self.ledger {
                    None => Step::TryLocal,
                    Some(ledger) => match ledger.identity_exists_by_account(account_key).await {
                        Ok(true) => Step::Done(Resolution::LedgerConfirmed),
                        Ok(false) => Step::TryLocal,
                        Err(e) => {
                            self.absorb("exists", &e);
                            Step::TryLocal
                        }
                    },
                },
                Step::TryLocal => {
                    if self.local.identity_exists_by_account(account_key)? {
                        Step::Done(Resolution::LocalConfirmed(()))
                    } else {
                        Step::Done(Resolution::NotFound)
                    }
                }
                Step::Done(resolution) => return Ok(resolution),
            };
            tracing::debug!(step = step.name(), "exists resolver step");
        }
    }

    /// Whether the ledger holds exactly `digest`. Ledger errors read as `false`.
    pub async fn digest_known_to_ledger(&self, digest: &DescriptorDigest) -> bool {
        let Some(ledger) = &self.ledger else {
            return false;
        };
        match ledger.verify_identity(digest).await {
            Ok(known) => known,
            Err(e) => {
                self.absorb("duplicate_scan", &e);
                false
            }
        }
    }

    /// Write a new registration: to the ledger if possible, always locally.
    ///
    /// A ledger failure of any kind downgrades the record to `local_only`.
    /// Once the ledger call has resolved, the local write runs without
    /// yielding, so dropping the returned future never leaves a ledger
    /// registration without its local record being attempted.
    pub async fn register(
        &self,
        account_key: &AccountKey,
        descriptor: &BiometricDescriptor,
        digest: DescriptorDigest,
    ) -> Result<IdentityRecord, StoreError> {
        let ledger_token = match &self.ledger {
            None => None,
            Some(ledger) => match ledger.register_identity(account_key, &digest).await {
                Ok(token) => Some(token),
                Err(e) => {
                    self.absorb("register", &e);
                    None
                }
            },
        };

        let registered_at = Timestamp::now();
        let record = IdentityRecord {
            account_id: derive_account_id(account_key, &digest, registered_at),
            account_key: account_key.clone(),
            descriptor: Some(descriptor.clone()),
            digest,
            registered_on: if ledger_token.is_some() {
                RegisteredOn::Ledger
            } else {
                RegisteredOn::LocalOnly
            },
            registered_at,
            ledger_token,
        };
        self.local.register_identity(&record)?;
        Ok(record)
    }

    /// Replay `local_only` records to the ledger in registration order.
    ///
    /// Stops at the first `Unavailable`; other ledger refusals skip the
    /// record, which stays `local_only`.
    pub async fn sync_pending(&self) -> Result<SyncReport, StoreError> {
        let pending = self.local.pending_ledger()?;
        let mut report = SyncReport {
            pending: pending.len(),
            ..SyncReport::default()
        };
        let Some(ledger) = &self.ledger else {
            return Ok(report);
        };

        for record in &pending {
            report.attempted += 1;
            match ledger
                .register_identity(&record.account_key, &record.digest)
                .await
            {
                Ok(token) => {
                    self.local
                        .mark_ledger_confirmed(&record.account_key, &token)?;
                    report.upgraded += 1;
                    tracing::info!(account_key = %record.account_key, %token, "deferred ledger write confirmed");
                }
                Err(LedgerError::Unavailable(reason)) => {
                    tracing::warn!(%reason, "ledger unavailable, stopping sync");
                    break;
                }
                Err(e) => {
                    tracing::warn!(account_key = %record.account_key, error = %e, "ledger declined deferred write");
                }
            }
        }
        report.pending -= report.upgraded;
        Ok(report)
    }

    /// Ledger reachability, or `None` when no ledger is configured.
    pub async fn ledger_status(&self) -> Option<LedgerStatus> {
        match &self.ledger {
            Some(ledger) => Some(ledger.status().await),
            None => None,
        }
    }
}
