//! Ledger side of identity resolution.
//!
//! The ledger is an append-only registry that only ever sees the digest of a
//! descriptor, never the descriptor itself. It is reached through the
//! [`LedgerClient`] trait; [`LedgerBackend`] bounds every call with a timeout
//! and applies the registration cost pre-check.
//!
//! Two clients ship with the crate: [`HttpLedgerClient`] talks JSON to a
//! ledger node, and [`DevLedger`] is an in-process registry used by the dev
//! ledger node and by tests.

pub mod backend;
pub mod client;
pub mod dev;
pub mod error;
pub mod http;

pub use backend::{LedgerBackend, LedgerStatus, LedgerTimeouts};
pub use client::LedgerClient;
pub use dev::{DevLedger, DevLedgerConfig};
pub use error::LedgerError;
pub use http::HttpLedgerClient;
