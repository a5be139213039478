//! LMDB database integrity checks.
//!
//! Run on startup (and by `faceid check`) to detect corruption before the
//! engine starts serving requests.

use std::path::Path;

use heed::types::Bytes;

use crate::environment::{LmdbEnvironment, ACCOUNT_INDEX_DB, IDENTITIES_DB, META_DB};
use crate::identity::{decode_record, decode_seq};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub identities: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

const EXPECTED_DATABASES: &[&str] = &[IDENTITIES_DB, ACCOUNT_INDEX_DB, META_DB];

/// Check LMDB database integrity.
///
/// Counts entries in each expected database, decodes every identity record,
/// and verifies that the account index and the records agree in both
/// directions. Problems are collected in the report rather than failing fast.
pub fn check_integrity(environment: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let env = environment.env();
    let rtxn = env.read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    // Records -> index.
    for entry in environment.identities_db.iter(&rtxn)? {
        let (seq_bytes, value) = entry?;
        report.identities += 1;
        let seq = match decode_seq(seq_bytes) {
            Ok(seq) => seq,
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        };
        let record = match decode_record(value) {
            Ok(record) => record,
            Err(e) => {
                report.errors.push(format!("record {}: {}", seq, e));
                continue;
            }
        };
        match environment
            .account_index_db
            .get(&rtxn, record.account_key.as_bytes())?
        {
            Some(indexed) if decode_seq(indexed).ok() == Some(seq) => {}
            Some(_) => report.errors.push(format!(
                "account index for '{}' does not point at record {}",
                record.account_key, seq
            )),
            None => report.errors.push(format!(
                "record {} ('{}') is missing from the account index",
                seq, record.account_key
            )),
        }
    }

    // Index -> records.
    for entry in environment.account_index_db.iter(&rtxn)? {
        let (key, seq_bytes) = entry?;
        let seq = match decode_seq(seq_bytes) {
            Ok(seq) => seq,
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        };
        if environment.identities_db.get(&rtxn, &seq.to_be_bytes())?.is_none() {
            report.errors.push(format!(
                "account index entry '{}' points at missing record {}",
                String::from_utf8_lossy(key),
                seq
            ));
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
