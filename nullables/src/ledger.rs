//! Nullable ledger client with failure and latency injection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use faceid_ledger::{DevLedger, LedgerClient, LedgerError};
use faceid_types::{AccountKey, ConfirmationToken, DescriptorDigest};

/// How the null ledger answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerMode {
    /// Delegate to the in-memory ledger.
    Healthy,
    /// Every call fails immediately with `Unavailable`.
    Unavailable,
    /// Every call hangs far longer than any configured timeout.
    Stalled,
    /// Reads succeed; cost estimates and submissions fail for lack of funds.
    InsufficientResources,
    /// Reads succeed; submissions are rejected.
    Rejected,
}

/// A ledger client backed by a [`DevLedger`], switchable into failure modes.
pub struct NullLedgerClient {
    ledger: DevLedger,
    mode: Mutex<LedgerMode>,
    latency: Mutex<Duration>,
    height_calls: AtomicU64,
    register_calls: AtomicU64,
    verify_calls: AtomicU64,
    exists_calls: AtomicU64,
}

impl NullLedgerClient {
    pub fn new() -> Self {
        Self::with_mode(LedgerMode::Healthy)
    }

    pub fn with_mode(mode: LedgerMode) -> Self {
        Self {
            ledger: DevLedger::default(),
            mode: Mutex::new(mode),
            latency: Mutex::new(Duration::ZERO),
            height_calls: AtomicU64::new(0),
            register_calls: AtomicU64::new(0),
            verify_calls: AtomicU64::new(0),
            exists_calls: AtomicU64::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::with_mode(LedgerMode::Unavailable)
    }

    pub fn set_mode(&self, mode: LedgerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn mode(&self) -> LedgerMode {
        *self.mode.lock().unwrap()
    }

    /// Delay added before every answer.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// The in-memory ledger behind this client, for seeding and inspection.
    pub fn ledger(&self) -> &DevLedger {
        &self.ledger
    }

    /// Register directly on the underlying ledger, bypassing the mode.
    pub fn preload(&self, account_key: &AccountKey, digest: &DescriptorDigest) {
        self.ledger.register(account_key, digest).unwrap();
    }

    pub fn height_calls(&self) -> u64 {
        self.height_calls.load(Ordering::SeqCst)
    }

    /// Number of submissions attempted (cost estimates are not counted).
    pub fn register_calls(&self) -> u64 {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u64 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Apply latency and the availability part of the current mode.
    async fn enter(&self) -> Result<LedgerMode, LedgerError> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.mode() {
            LedgerMode::Unavailable => {
                Err(LedgerError::Unavailable("null ledger is offline".to_string()))
            }
            LedgerMode::Stalled => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(LedgerError::Unavailable("null ledger stalled".to_string()))
            }
            mode => Ok(mode),
        }
    }
}

impl Default for NullLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for NullLedgerClient {
    async fn block_height(&self) -> Result<u64, LedgerError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.ledger.height())
    }

    async fn estimate_registration_cost(
        &self,
        account_key: &AccountKey,
        _digest: &DescriptorDigest,
    ) -> Result<u64, LedgerError> {
        match self.enter().await? {
            LedgerMode::InsufficientResources => Err(LedgerError::InsufficientResources(
                "null ledger has no funds".to_string(),
            )),
            _ => self.ledger.estimate(account_key),
        }
    }

    async fn submit_registration(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        match self.enter().await? {
            LedgerMode::InsufficientResources => Err(LedgerError::InsufficientResources(
                "null ledger has no funds".to_string(),
            )),
            LedgerMode::Rejected => Err(LedgerError::Rejected(
                "null ledger rejects writes".to_string(),
            )),
            _ => self.ledger.register(account_key, digest),
        }
    }

    async fn digest_registered(&self, digest: &DescriptorDigest) -> Result<bool, LedgerError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.ledger.contains_digest(digest))
    }

    async fn account_registered(&self, account_key: &AccountKey) -> Result<bool, LedgerError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.ledger.contains_account(account_key))
    }
}
