//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use faceid_engine::{EngineError, RegistrationError, VerificationError};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid account key: {0:?}")]
    InvalidAccountKey(String),

    #[error("account '{0}' is already registered")]
    DuplicateAccount(String),

    #[error("this face is already enrolled under another account")]
    DuplicateBiometric,

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("store error: {0}")]
    Store(String),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_)
            | RpcError::InvalidDescriptor(_)
            | RpcError::InvalidAccountKey(_) => StatusCode::BAD_REQUEST,
            RpcError::DuplicateAccount(_) | RpcError::DuplicateBiometric => StatusCode::CONFLICT,
            RpcError::MetricsDisabled => StatusCode::NOT_FOUND,
            RpcError::Store(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            RpcError::InvalidRequest(_) => "invalid_request",
            RpcError::InvalidDescriptor(_) => "invalid_descriptor",
            RpcError::InvalidAccountKey(_) => "invalid_account_key",
            RpcError::DuplicateAccount(_) => "duplicate_account",
            RpcError::DuplicateBiometric => "duplicate_biometric",
            RpcError::MetricsDisabled => "metrics_disabled",
            RpcError::Store(_) => "storage_error",
            RpcError::Server(_) => "server_error",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for RpcError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::InvalidDescriptor(reason) => RpcError::InvalidDescriptor(reason),
            RegistrationError::InvalidAccountKey(key) => RpcError::InvalidAccountKey(key),
            RegistrationError::DuplicateAccount(key) => RpcError::DuplicateAccount(key.to_string()),
            RegistrationError::DuplicateBiometric => RpcError::DuplicateBiometric,
            RegistrationError::Storage(e) => RpcError::Store(e.to_string()),
        }
    }
}

impl From<VerificationError> for RpcError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::InvalidDescriptor(reason) => RpcError::InvalidDescriptor(reason),
            VerificationError::Storage(e) => RpcError::Store(e.to_string()),
        }
    }
}

impl From<EngineError> for RpcError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Storage(e) => RpcError::Store(e.to_string()),
            other => RpcError::Server(other.to_string()),
        }
    }
}
