//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::identity::LmdbIdentityStore;
use crate::migration::Migrator;
use crate::LmdbError;

pub(crate) const IDENTITIES_DB: &str = "identities";
pub(crate) const ACCOUNT_INDEX_DB: &str = "account_index";
pub(crate) const META_DB: &str = "meta";

const MAX_DBS: u32 = 4;

/// Default map size: 64 MiB holds hundreds of thousands of 128-float records.
pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    path: PathBuf,
    pub(crate) env: Arc<Env>,
    /// Registration sequence (u64 big-endian) -> bincode `IdentityRecord`.
    pub(crate) identities_db: Database<Bytes, Bytes>,
    /// Account key bytes -> registration sequence.
    pub(crate) account_index_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at `path`, creating the databases
    /// and migrating the schema if needed.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path; faceid
        // never opens the same directory twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let identities_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(IDENTITIES_DB))?;
        let account_index_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(ACCOUNT_INDEX_DB))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            path: path.to_path_buf(),
            env: Arc::new(env),
            identities_db,
            account_index_db,
            meta_db,
        };
        Migrator::run(&environment)?;

        tracing::info!(path = %path.display(), "opened LMDB identity store");
        Ok(environment)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Identity store handle sharing this environment.
    pub fn identity_store(&self) -> LmdbIdentityStore {
        LmdbIdentityStore {
            env: Arc::clone(&self.env),
            identities_db: self.identities_db,
            account_index_db: self.account_index_db,
        }
    }
}
