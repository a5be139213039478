//! Identity resolution engine.
//!
//! Registers and re-authenticates accounts by biometric descriptor against two
//! backends: an authoritative ledger that only sees digests, and a local
//! store that keeps raw descriptors for similarity matching. The engine
//! reconciles both into a single decision and keeps one face bound to at most
//! one account even while the ledger is unreachable.

pub mod config;
pub mod engine;
pub mod error;
pub mod local;
pub mod locks;
pub mod metrics;
pub mod resolver;
pub mod tracing_spans;

pub use config::{EngineConfig, LedgerConfig};
pub use engine::{
    EngineStatus, IdentityResolutionEngine, RegistrationOutcome, VerificationOutcome,
    VerifiedIdentity,
};
pub use error::{EngineError, RegistrationError, VerificationError};
pub use local::{LocalMatch, LocalStoreBackend};
pub use locks::KeyedLocks;
pub use metrics::EngineMetrics;
pub use resolver::{BackendResolver, Resolution, Step, SyncReport};
