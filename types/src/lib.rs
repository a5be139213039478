//! Fundamental types for faceid.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! biometric descriptors, their digests, account keys, identity records and timestamps.

pub mod account;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod record;
pub mod time;

pub use account::{AccountId, AccountKey, MAX_ACCOUNT_KEY_LEN};
pub use descriptor::{BiometricDescriptor, DEFAULT_DESCRIPTOR_LEN};
pub use error::DescriptorError;
pub use hash::{ConfirmationToken, DescriptorDigest};
pub use record::{Backend, IdentityRecord, RegisteredOn};
pub use time::Timestamp;
