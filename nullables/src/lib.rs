//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! The engine's external dependencies (identity store, ledger) sit behind
//! traits. This crate provides test-friendly implementations that:
//! - Keep all state in memory and never touch the filesystem or network
//! - Can be switched into failure modes programmatically
//! - Count the calls they receive
//!
//! Usage: swap real implementations for nullables in tests.

pub mod ledger;
pub mod store;

pub use ledger::{LedgerMode, NullLedgerClient};
pub use store::NullIdentityStore;
