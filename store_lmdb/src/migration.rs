//! Database schema migration engine.
//!
//! Tracks a monotonically increasing schema version in the meta database and
//! runs sequential migration functions to bring an older store up to date.

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh store (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - A stored version *higher* than supported was written by a newer
    ///   build and is refused.
    pub fn run(environment: &LmdbEnvironment) -> Result<(), LmdbError> {
        let current = Self::schema_version(environment)?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "identity store schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Corruption(format!(
                "schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(version, version + 1)?;
        }

        Self::set_schema_version(environment, CURRENT_SCHEMA_VERSION)?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }

    /// Stored schema version, 0 when none has been written.
    pub fn schema_version(environment: &LmdbEnvironment) -> Result<u32, LmdbError> {
        let rtxn = environment.env.read_txn()?;
        match environment.meta_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Corruption(format!("schema version has {} bytes", bytes.len()))
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub(crate) fn set_schema_version(
        environment: &LmdbEnvironment,
        version: u32,
    ) -> Result<(), LmdbError> {
        let mut wtxn = environment.env.write_txn()?;
        environment
            .meta_db
            .put(&mut wtxn, SCHEMA_VERSION_KEY, &version.to_le_bytes())?;
        wtxn.commit()?;
        Ok(())
    }
}

fn run_migration(from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        (0, 1) => {
            // Initial schema: identities keyed by sequence plus the account index.
            Ok(())
        }
        _ => Err(LmdbError::Corruption(format!(
            "unknown migration: {} -> {}",
            from, to
        ))),
    }
}
