//! Pre-built [`tracing::Span`] constructors for engine operations.
//!
//! Consistent span names and field sets make registrations and
//! verifications easy to filter and correlate in log output.

use tracing::{info_span, Span};

use faceid_types::AccountKey;

/// Span covering one registration, from validation to the local write.
pub fn register_span(account_key: &AccountKey) -> Span {
    info_span!("register", account_key = %account_key)
}

/// Span covering one verification.
pub fn verify_span(account_key: &AccountKey) -> Span {
    info_span!("verify", account_key = %account_key)
}

pub fn exists_span(account_key: &AccountKey) -> Span {
    info_span!("exists", account_key = %account_key)
}

/// Span covering a replay of pending records to the ledger.
pub fn sync_span() -> Span {
    info_span!("sync_pending")
}

/// Span covering a single HTTP API request.
pub fn api_span(route: &str) -> Span {
    info_span!("api", route = %route)
}
