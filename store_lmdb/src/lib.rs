//! LMDB storage backend for faceid.
//!
//! Implements [`faceid_store::IdentityStore`] using the `heed` LMDB bindings.
//! All databases live in a single environment; every write is one LMDB write
//! transaction, so records appear atomically to readers.

pub mod environment;
pub mod error;
pub mod identity;
pub mod integrity;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use identity::LmdbIdentityStore;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
