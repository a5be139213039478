//! LMDB implementation of IdentityStore.
//!
//! Records are keyed by a big-endian registration sequence so a plain cursor
//! walk yields registration order. A second database maps account keys to
//! that sequence. Both are written in the same transaction.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use faceid_store::{IdentityStore, StoreError};
use faceid_types::{AccountKey, ConfirmationToken, IdentityRecord, MAX_ACCOUNT_KEY_LEN};

use crate::LmdbError;

pub struct LmdbIdentityStore {
    pub(crate) env: Arc<Env>,
    pub(crate) identities_db: Database<Bytes, Bytes>,
    pub(crate) account_index_db: Database<Bytes, Bytes>,
}

fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

pub(crate) fn decode_seq(bytes: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Corruption(format!("sequence key has {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

pub(crate) fn decode_record(bytes: &[u8]) -> Result<IdentityRecord, LmdbError> {
    bincode::deserialize(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn encode_record(record: &IdentityRecord) -> Result<Vec<u8>, LmdbError> {
    bincode::serialize(record).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl LmdbIdentityStore {
    fn lookup_seq(&self, txn: &RoTxn, account_key: &AccountKey) -> Result<Option<u64>, LmdbError> {
        // Over-long keys are never stored, and LMDB refuses them as lookup keys.
        if account_key.as_bytes().len() > MAX_ACCOUNT_KEY_LEN {
            return Ok(None);
        }
        match self.account_index_db.get(txn, account_key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_seq(bytes)?)),
            None => Ok(None),
        }
    }

    fn load_by_seq(&self, txn: &RoTxn, seq: u64, account_key: &AccountKey) -> Result<IdentityRecord, LmdbError> {
        let bytes = self.identities_db.get(txn, &seq_key(seq))?.ok_or_else(|| {
            LmdbError::Corruption(format!(
                "account index for '{account_key}' points at missing record {seq}"
            ))
        })?;
        decode_record(bytes)
    }
}

impl IdentityStore for LmdbIdentityStore {
    fn insert_identity(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let value = encode_record(record)?;
        let key = record.account_key.as_bytes();
        if key.len() > MAX_ACCOUNT_KEY_LEN {
            return Err(LmdbError::KeyTooLong(key.len()).into());
        }

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .account_index_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            // Dropping the transaction aborts it.
            return Err(StoreError::Duplicate(record.account_key.to_string()));
        }

        let next_seq = match self.identities_db.last(&wtxn).map_err(LmdbError::from)? {
            Some((last_key, _)) => decode_seq(last_key)? + 1,
            None => 0,
        };

        self.identities_db
            .put(&mut wtxn, &seq_key(next_seq), &value)
            .map_err(LmdbError::from)?;
        self.account_index_db
            .put(&mut wtxn, key, &seq_key(next_seq))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(account_key = %record.account_key, seq = next_seq, "identity record stored");
        Ok(())
    }

    fn get_identity(&self, account_key: &AccountKey) -> Result<Option<IdentityRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.lookup_seq(&rtxn, account_key)? {
            Some(seq) => Ok(Some(self.load_by_seq(&rtxn, seq, account_key)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, account_key: &AccountKey) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.lookup_seq(&rtxn, account_key)?.is_some())
    }

    fn identity_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.identities_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn iter_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.identities_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in iter {
            let (_seq, bytes) = entry.map_err(LmdbError::from)?;
            records.push(decode_record(bytes)?);
        }
        Ok(records)
    }

    fn mark_ledger_confirmed(
        &self,
        account_key: &AccountKey,
        token: &ConfirmationToken,
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = self
            .lookup_seq(&wtxn, account_key)?
            .ok_or_else(|| LmdbError::NotFound(account_key.to_string()))?;
        let mut record = self.load_by_seq(&wtxn, seq, account_key)?;
        record.upgrade_to_ledger(token.clone());
        let value = encode_record(&record)?;
        self.identities_db
            .put(&mut wtxn, &seq_key(seq), &value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
