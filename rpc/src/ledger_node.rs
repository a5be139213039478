//! HTTP front for the in-process dev ledger.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use faceid_ledger::http::{
    AccountRequest, CostResponse, DigestRequest, ErrorResponse, HeightResponse,
    RegisteredResponse, RegistrationRequest, TokenResponse,
};
use faceid_ledger::{DevLedger, LedgerError};

use crate::error::RpcError;

/// Wire form of a ledger refusal.
pub struct LedgerFailure(LedgerError);

impl IntoResponse for LedgerFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::InsufficientResources(_) => StatusCode::PAYMENT_REQUIRED,
            LedgerError::Rejected(_) => StatusCode::CONFLICT,
            LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::InvalidResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for LedgerFailure {
    fn from(e: LedgerError) -> Self {
        LedgerFailure(e)
    }
}

async fn height(State(ledger): State<Arc<DevLedger>>) -> Json<HeightResponse> {
    Json(HeightResponse {
        height: ledger.height(),
    })
}

async fn estimate(
    State(ledger): State<Arc<DevLedger>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<CostResponse>, LedgerFailure> {
    let cost = ledger.estimate(&request.account_key)?;
    Ok(Json(CostResponse { cost }))
}

async fn register(
    State(ledger): State<Arc<DevLedger>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<TokenResponse>, LedgerFailure> {
    let token = ledger.register(&request.account_key, &request.digest)?;
    tracing::info!(account_key = %request.account_key, %token, "ledger registration accepted");
    Ok(Json(TokenResponse { token }))
}

async fn verify(
    State(ledger): State<Arc<DevLedger>>,
    Json(request): Json<DigestRequest>,
) -> Json<RegisteredResponse> {
    Json(RegisteredResponse {
        registered: ledger.contains_digest(&request.digest),
    })
}

async fn exists(
    State(ledger): State<Arc<DevLedger>>,
    Json(request): Json<AccountRequest>,
) -> Json<RegisteredResponse> {
    Json(RegisteredResponse {
        registered: ledger.contains_account(&request.account_key),
    })
}

/// Router speaking the ledger protocol of [`faceid_ledger::HttpLedgerClient`].
pub fn ledger_router(ledger: Arc<DevLedger>) -> Router {
    Router::new()
        .route("/ledger/height", get(height))
        .route("/ledger/estimate", post(estimate))
        .route("/ledger/register", post(register))
        .route("/ledger/verify", post(verify))
        .route("/ledger/exists", post(exists))
        .with_state(ledger)
}

/// Serve the dev ledger on `listener` until `shutdown` resolves.
pub async fn serve_ledger<F>(
    listener: TcpListener,
    ledger: Arc<DevLedger>,
    shutdown: F,
) -> Result<(), RpcError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "dev ledger node listening");
    }
    axum::serve(listener, ledger_router(ledger))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RpcError::Server(e.to_string()))
}
