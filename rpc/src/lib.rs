//! HTTP surface for faceid.
//!
//! Two servers live here:
//! - [`ApiServer`]: the identity API over an [`faceid_engine::IdentityResolutionEngine`]
//!   (register, verify, exists, sync, status, metrics).
//! - [`ledger_node`]: a JSON ledger node backed by [`faceid_ledger::DevLedger`],
//!   speaking the protocol [`faceid_ledger::HttpLedgerClient`] expects.

pub mod error;
pub mod handlers;
pub mod ledger_node;
pub mod server;

pub use error::RpcError;
pub use server::{api_router, ApiServer, ApiState};
