//! Hashing and canonical encoding for faceid.
//!
//! - **Blake2b-256** for descriptor digests and derived identifiers
//! - A canonical, locale-independent byte encoding of descriptors

pub mod account;
pub mod codec;
pub mod hash;

pub use account::derive_account_id;
pub use codec::DescriptorCodec;
pub use hash::{blake2b_256, blake2b_256_multi};
