//! The public face of identity resolution.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;

use faceid_crypto::DescriptorCodec;
use faceid_ledger::{HttpLedgerClient, LedgerBackend, LedgerStatus};
use faceid_store::{IdentityStore, StoreError};
use faceid_store_lmdb::{check_integrity, LmdbEnvironment};
use faceid_types::{
    AccountId, AccountKey, Backend, BiometricDescriptor, DescriptorDigest, IdentityRecord,
    RegisteredOn,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, RegistrationError, VerificationError};
use crate::local::LocalStoreBackend;
use crate::locks::KeyedLocks;
use crate::metrics::EngineMetrics;
use crate::resolver::{BackendResolver, Resolution, SyncReport};
use crate::tracing_spans::{exists_span, register_span, sync_span, verify_span};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub record: IdentityRecord,
    /// `Ledger` when the ledger accepted the write, `LocalStore` otherwise.
    pub confirmed_by: Backend,
}

/// Who a successful verification resolved to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerifiedIdentity {
    pub account_key: AccountKey,
    /// Absent when the ledger confirmed a digest that has no local record.
    pub account_id: Option<AccountId>,
    pub registered_on: Option<RegisteredOn>,
    pub confirmed_by: Backend,
    /// Distance to the matched descriptor; absent for exact ledger matches.
    pub distance: Option<f64>,
}

impl VerifiedIdentity {
    fn from_record(record: &IdentityRecord, confirmed_by: Backend, distance: Option<f64>) -> Self {
        Self {
            account_key: record.account_key.clone(),
            account_id: Some(record.account_id.clone()),
            registered_on: Some(record.registered_on),
            confirmed_by,
            distance,
        }
    }

    fn anonymous(account_key: AccountKey) -> Self {
        Self {
            account_key,
            account_id: None,
            registered_on: None,
            confirmed_by: Backend::Ledger,
            distance: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub identity: Option<VerifiedIdentity>,
}

impl VerificationOutcome {
    fn rejected() -> Self {
        Self {
            verified: false,
            identity: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineStatus {
    /// `None` when the engine runs without a ledger.
    pub ledger: Option<LedgerStatus>,
    pub local_records: u64,
    pub pending_ledger: u64,
    pub descriptor_len: usize,
}

pub struct IdentityResolutionEngine {
    codec: DescriptorCodec,
    resolver: BackendResolver,
    account_locks: KeyedLocks,
    /// Held across the duplicate scans and the write of every registration.
    registration_gate: Mutex<()>,
    sync_gate: Mutex<()>,
    metrics: Arc<EngineMetrics>,
}

impl IdentityResolutionEngine {
    pub fn new(
        codec: DescriptorCodec,
        store: Arc<dyn IdentityStore>,
        ledger: Option<LedgerBackend>,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let resolver = BackendResolver::new(ledger, LocalStoreBackend::new(store), metrics.clone());
        Self {
            codec,
            resolver,
            account_locks: KeyedLocks::new(),
            registration_gate: Mutex::new(()),
            sync_gate: Mutex::new(()),
            metrics,
        }
    }

    /// Build an engine from configuration: an LMDB store under `data_dir`
    /// and, if enabled, an HTTP ledger client.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let environment = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
        let report = check_integrity(&environment)?;
        if !report.is_healthy() {
            return Err(EngineError::Storage(StoreError::Corruption(
                report.errors.join("; "),
            )));
        }
        let store: Arc<dyn IdentityStore> = Arc::new(environment.identity_store());

        let ledger = if config.ledger.enabled {
            let client = Arc::new(HttpLedgerClient::new(&config.ledger.endpoint));
            Some(
                LedgerBackend::new(client, config.ledger.timeouts())
                    .with_max_registration_cost(config.ledger.max_registration_cost),
            )
        } else {
            None
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            records = report.identities,
            ledger = config.ledger.enabled,
            "identity engine opened"
        );
        let engine = Self::new(DescriptorCodec::new(config.descriptor_len), store, ledger);
        engine.refresh_record_gauge();
        Ok(engine)
    }

    pub fn codec(&self) -> &DescriptorCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    fn refresh_record_gauge(&self) {
        if let Ok(count) = self.resolver.local().identity_count() {
            self.metrics.local_records.set(count as i64);
        }
    }

    /// Register `descriptor` under `account_key`.
    ///
    /// Refuses the account if either backend knows the key, and refuses the
    /// face if the local store holds a descriptor within the match threshold
    /// or the ledger holds the exact digest. A successful registration is
    /// always stored locally; `confirmed_by` says whether the ledger took it.
    pub async fn register(
        &self,
        account_key: AccountKey,
        descriptor: &BiometricDescriptor,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let span = register_span(&account_key);
        self.register_inner(account_key, descriptor)
            .instrument(span)
            .await
    }

    async fn register_inner(
        &self,
        account_key: AccountKey,
        descriptor: &BiometricDescriptor,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if !account_key.is_valid() {
            return Err(RegistrationError::InvalidAccountKey(account_key.to_string()));
        }
        let digest = self.codec.digest(descriptor)?;

        let _account_guard = self.account_locks.lock(&account_key).await;
        let _gate = self.registration_gate.lock().await;

        if self.resolver.exists(&account_key).await? != Resolution::NotFound {
            self.metrics
                .duplicate_rejections
                .with_label_values(&["account"])
                .inc();
            tracing::info!("registration refused: account key taken");
            return Err(RegistrationError::DuplicateAccount(account_key));
        }

        if let Some(found) = self.resolver.local().verify_identity(descriptor, &digest)? {
            self.metrics
                .duplicate_rejections
                .with_label_values(&["biometric"])
                .inc();
            tracing::info!(distance = found.distance, "registration refused: face matches a local record");
            return Err(RegistrationError::DuplicateBiometric);
        }
        if self.resolver.digest_known_to_ledger(&digest).await {
            self.metrics
                .duplicate_rejections
                .with_label_values(&["biometric"])
                .inc();
            tracing::info!("registration refused: digest already on the ledger");
            return Err(RegistrationError::DuplicateBiometric);
        }

        let record = self
            .resolver
            .register(&account_key, descriptor, digest)
            .await?;

        self.metrics
            .registrations
            .with_label_values(&[record.registered_on.as_str()])
            .inc();
        self.metrics.local_records.inc();
        tracing::info!(
            account_id = %record.account_id,
            registered_on = %record.registered_on,
            "identity registered"
        );

        let confirmed_by = match record.registered_on {
            RegisteredOn::Ledger => Backend::Ledger,
            RegisteredOn::LocalOnly => Backend::LocalStore,
        };
        Ok(RegistrationOutcome {
            record,
            confirmed_by,
        })
    }

    /// Decide whether `descriptor` belongs to a registered identity.
    ///
    /// Matching is biometric only: the local fallback reports whichever
    /// record matched, which need not be `account_key`'s.
    pub async fn verify(
        &self,
        account_key: AccountKey,
        descriptor: &BiometricDescriptor,
    ) -> Result<VerificationOutcome, VerificationError> {
        let span = verify_span(&account_key);
        self.verify_inner(account_key, descriptor)
            .instrument(span)
            .await
    }

    async fn verify_inner(
        &self,
        account_key: AccountKey,
        descriptor: &BiometricDescriptor,
    ) -> Result<VerificationOutcome, VerificationError> {
        let digest = self.codec.digest(descriptor)?;

        let outcome = match self.resolver.verify(&digest, descriptor).await? {
            Resolution::LedgerConfirmed => {
                let identity = match self.ledger_confirmed_record(&account_key, &digest)? {
                    Some(record) => VerifiedIdentity::from_record(&record, Backend::Ledger, None),
                    None => VerifiedIdentity::anonymous(account_key),
                };
                VerificationOutcome {
                    verified: true,
                    identity: Some(identity),
                }
            }
            Resolution::LocalConfirmed(found) => VerificationOutcome {
                verified: true,
                identity: Some(VerifiedIdentity::from_record(
                    &found.record,
                    Backend::LocalStore,
                    Some(found.distance),
                )),
            },
            Resolution::NotFound => VerificationOutcome::rejected(),
        };

        let result = match &outcome.identity {
            Some(identity) => identity.confirmed_by.as_str(),
            None => "not_found",
        };
        self.metrics
            .verifications
            .with_label_values(&[result])
            .inc();
        tracing::info!(verified = outcome.verified, result, "verification decided");
        Ok(outcome)
    }

    /// Local record holding the digest the ledger confirmed: `account_key`'s
    /// own record when its digest is the one confirmed, else whichever record
    /// holds that digest.
    fn ledger_confirmed_record(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let local = self.resolver.local();
        match local.find_by_account(account_key)? {
            Some(record) if record.digest == *digest => Ok(Some(record)),
            _ => local.find_by_digest(digest),
        }
    }

    /// Whether `account_key` is registered on either backend.
    ///
    /// Ledger failures fall back to the local answer; local failures are
    /// returned.
    pub async fn account_exists(&self, account_key: &AccountKey) -> Result<bool, EngineError> {
        let resolution = self
            .resolver
            .exists(account_key)
            .instrument(exists_span(account_key))
            .await?;
        Ok(resolution != Resolution::NotFound)
    }

    /// Replay `local_only` records to the ledger. Concurrent calls queue.
    pub async fn sync_pending(&self) -> Result<SyncReport, EngineError> {
        let _sync = self.sync_gate.lock().await;
        let report = self.resolver.sync_pending().instrument(sync_span()).await?;
        tracing::info!(
            attempted = report.attempted,
            upgraded = report.upgraded,
            pending = report.pending,
            "sync finished"
        );
        Ok(report)
    }

    /// Ledger reachability and local record counts.
    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let ledger = self.resolver.ledger_status().await;
        let local = self.resolver.local();
        let local_records = local.identity_count()?;
        let pending_ledger = local.pending_ledger()?.len() as u64;
        self.metrics.local_records.set(local_records as i64);
        Ok(EngineStatus {
            ledger,
            local_records,
            pending_ledger,
            descriptor_len: self.codec.dimension(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceid_ledger::{LedgerClient, LedgerTimeouts};
    use faceid_nullables::{LedgerMode, NullIdentityStore, NullLedgerClient};
    use std::time::Duration;

    fn engine(mode: Option<LedgerMode>) -> (IdentityResolutionEngine, Option<Arc<NullLedgerClient>>) {
        let client = mode.map(|m| Arc::new(NullLedgerClient::with_mode(m)));
        let ledger = client.clone().map(|c| {
            LedgerBackend::new(
                c as Arc<dyn LedgerClient>,
                LedgerTimeouts {
                    call: Duration::from_millis(50),
                    register: Duration::from_millis(50),
                },
            )
        });
        let engine = IdentityResolutionEngine::new(
            DescriptorCodec::new(2),
            Arc::new(NullIdentityStore::new()),
            ledger,
        );
        (engine, client)
    }

    fn desc(x: f32, y: f32) -> BiometricDescriptor {
        BiometricDescriptor::new(vec![x, y]).unwrap()
    }

    #[tokio::test]
    async fn wrong_length_is_invalid_descriptor() {
        let (engine, _) = engine(None);
        let bad = BiometricDescriptor::new(vec![0.1, 0.2, 0.3]).unwrap();
        assert!(matches!(
            engine.register(AccountKey::new("a"), &bad).await,
            Err(RegistrationError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            engine.verify(AccountKey::new("a"), &bad).await,
            Err(VerificationError::InvalidDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn blank_account_key_is_refused() {
        let (engine, _) = engine(None);
        assert!(matches!(
            engine.register(AccountKey::new(""), &desc(0.1, 0.1)).await,
            Err(RegistrationError::InvalidAccountKey(_))
        ));
    }

    #[tokio::test]
    async fn without_ledger_everything_is_local() {
        let (engine, _) = engine(None);
        let outcome = engine
            .register(AccountKey::new("a"), &desc(0.1, 0.1))
            .await
            .unwrap();
        assert_eq!(outcome.confirmed_by, Backend::LocalStore);
        assert_eq!(outcome.record.registered_on, RegisteredOn::LocalOnly);

        let status = engine.status().await.unwrap();
        assert_eq!(status.ledger, None);
        assert_eq!(status.local_records, 1);
        assert_eq!(status.pending_ledger, 1);
    }

    #[tokio::test]
    async fn ledger_confirmed_verify_reports_local_record() {
        let (engine, _) = engine(Some(LedgerMode::Healthy));
        let face = desc(0.1, 0.1);
        let registered = engine.register(AccountKey::new("a"), &face).await.unwrap();
        assert_eq!(registered.confirmed_by, Backend::Ledger);

        let outcome = engine.verify(AccountKey::new("a"), &face).await.unwrap();
        let identity = outcome.identity.unwrap();
        assert!(outcome.verified);
        assert_eq!(identity.confirmed_by, Backend::Ledger);
        assert_eq!(identity.account_id, Some(registered.record.account_id));
    }

    #[tokio::test]
    async fn verified_identity_follows_the_face_not_the_claimed_key() {
        let (engine, client) = engine(Some(LedgerMode::Healthy));
        let client = client.unwrap();
        engine.register(AccountKey::new("alice"), &desc(0.0, 0.0)).await.unwrap();
        let bob = engine.register(AccountKey::new("bob"), &desc(3.0, 3.0)).await.unwrap();

        let by_ledger = engine
            .verify(AccountKey::new("alice"), &desc(3.0, 3.0))
            .await
            .unwrap()
            .identity
            .unwrap();
        assert_eq!(by_ledger.confirmed_by, Backend::Ledger);
        assert_eq!(by_ledger.account_key, AccountKey::new("bob"));
        assert_eq!(by_ledger.account_id, Some(bob.record.account_id.clone()));

        client.set_mode(LedgerMode::Unavailable);
        let by_local = engine
            .verify(AccountKey::new("alice"), &desc(3.0, 3.0))
            .await
            .unwrap()
            .identity
            .unwrap();
        assert_eq!(by_local.confirmed_by, Backend::LocalStore);
        assert_eq!(by_local.account_key, by_ledger.account_key);
        assert_eq!(by_local.account_id, by_ledger.account_id);
    }

    #[tokio::test]
    async fn ledger_only_digest_verifies_anonymously() {
        let (engine, client) = engine(Some(LedgerMode::Healthy));
        let face = desc(0.3, 0.3);
        let digest = engine.codec().digest(&face).unwrap();
        client.unwrap().preload(&AccountKey::new("elsewhere"), &digest);

        let outcome = engine.verify(AccountKey::new("who"), &face).await.unwrap();
        assert!(outcome.verified);
        assert_eq!(
            outcome.identity,
            Some(VerifiedIdentity {
                account_key: AccountKey::new("who"),
                account_id: None,
                registered_on: None,
                confirmed_by: Backend::Ledger,
                distance: None,
            })
        );
    }

    #[tokio::test]
    async fn digest_on_ledger_blocks_registration() {
        let (engine, client) = engine(Some(LedgerMode::Healthy));
        let face = desc(0.3, 0.3);
        let digest = engine.codec().digest(&face).unwrap();
        client.unwrap().preload(&AccountKey::new("elsewhere"), &digest);

        assert!(matches!(
            engine.register(AccountKey::new("new"), &face).await,
            Err(RegistrationError::DuplicateBiometric)
        ));
    }

    #[tokio::test]
    async fn account_on_ledger_blocks_registration() {
        let (engine, client) = engine(Some(LedgerMode::Healthy));
        client
            .unwrap()
            .preload(&AccountKey::new("a"), &faceid_types::DescriptorDigest::new([1; 32]));
        assert!(matches!(
            engine.register(AccountKey::new("a"), &desc(0.9, 0.9)).await,
            Err(RegistrationError::DuplicateAccount(_))
        ));
        assert!(engine.account_exists(&AccountKey::new("a")).await.unwrap());
    }

    #[tokio::test]
    async fn metrics_track_outcomes() {
        let (engine, _) = engine(Some(LedgerMode::Unavailable));
        let face = desc(0.1, 0.1);
        engine.register(AccountKey::new("a"), &face).await.unwrap();
        let _ = engine.register(AccountKey::new("b"), &face).await;
        engine.verify(AccountKey::new("a"), &face).await.unwrap();

        let m = engine.metrics();
        assert_eq!(m.registrations.with_label_values(&["local_only"]).get(), 1);
        assert_eq!(m.duplicate_rejections.with_label_values(&["biometric"]).get(), 1);
        assert_eq!(m.verifications.with_label_values(&["local_store"]).get(), 1);
        assert!(m.ledger_fallbacks.with_label_values(&["register"]).get() >= 1);
        assert_eq!(m.local_records.get(), 1);
    }

    #[tokio::test]
    async fn open_from_config_without_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().join("store"),
            descriptor_len: 2,
            ledger: crate::LedgerConfig {
                enabled: false,
                ..Default::default()
            },
            ..EngineConfig::default()
        };
        {
            let engine = IdentityResolutionEngine::open(&config).unwrap();
            engine.register(AccountKey::new("a"), &desc(0.1, 0.1)).await.unwrap();
        }
        let engine = IdentityResolutionEngine::open(&config).unwrap();
        assert!(engine.account_exists(&AccountKey::new("a")).await.unwrap());
        assert_eq!(engine.metrics().local_records.get(), 1);
    }
}
