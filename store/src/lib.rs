//! Abstract storage traits for faceid.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The engine depends only on the traits.

pub mod error;
pub mod identity;

pub use error::StoreError;
pub use identity::IdentityStore;
