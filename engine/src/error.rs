use thiserror::Error;

use faceid_store::StoreError;
use faceid_store_lmdb::LmdbError;
use faceid_types::{AccountKey, DescriptorError};

fn descriptor_reason(e: DescriptorError) -> String {
    match e {
        DescriptorError::InvalidDescriptor(reason) => reason,
        other => other.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid account key: {0:?}")]
    InvalidAccountKey(String),

    #[error("account '{0}' is already registered")]
    DuplicateAccount(AccountKey),

    #[error("this face is already enrolled under another account")]
    DuplicateBiometric,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<DescriptorError> for RegistrationError {
    fn from(e: DescriptorError) -> Self {
        RegistrationError::InvalidDescriptor(descriptor_reason(e))
    }
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<DescriptorError> for VerificationError {
    fn from(e: DescriptorError) -> Self {
        VerificationError::InvalidDescriptor(descriptor_reason(e))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbError> for EngineError {
    fn from(e: LmdbError) -> Self {
        EngineError::Storage(e.into())
    }
}
