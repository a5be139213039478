//! Identity API request handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use faceid_engine::tracing_spans::api_span;
use faceid_engine::{EngineStatus, RegistrationOutcome, SyncReport, VerificationOutcome};
use faceid_types::{
    AccountId, AccountKey, Backend, BiometricDescriptor, ConfirmationToken, DescriptorDigest,
    RegisteredOn, Timestamp,
};

use crate::error::RpcError;
use crate::server::ApiState;

fn parse_descriptor(values: Vec<f32>) -> Result<BiometricDescriptor, RpcError> {
    BiometricDescriptor::new(values).map_err(|e| RpcError::InvalidDescriptor(e.to_string()))
}

// ── Register ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub account_key: String,
    pub descriptor: Vec<f32>,
}

/// Registration result. The raw descriptor is never echoed back.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub account_id: AccountId,
    pub account_key: AccountKey,
    pub digest: DescriptorDigest,
    pub registered_on: RegisteredOn,
    pub registered_at: Timestamp,
    pub confirmed_by: Backend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_token: Option<ConfirmationToken>,
}

impl From<RegistrationOutcome> for RegisterResponse {
    fn from(outcome: RegistrationOutcome) -> Self {
        let record = outcome.record;
        Self {
            account_id: record.account_id,
            account_key: record.account_key,
            digest: record.digest,
            registered_on: record.registered_on,
            registered_at: record.registered_at,
            confirmed_by: outcome.confirmed_by,
            ledger_token: record.ledger_token,
        }
    }
}

pub async fn register(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, RpcError> {
    let descriptor = parse_descriptor(request.descriptor)?;
    let outcome = state
        .engine
        .register(AccountKey::new(request.account_key), &descriptor)
        .instrument(api_span("register"))
        .await?;
    Ok(Json(outcome.into()))
}

// ── Verify ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub account_key: String,
    pub descriptor: Vec<f32>,
}

pub async fn verify(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerificationOutcome>, RpcError> {
    let descriptor = parse_descriptor(request.descriptor)?;
    let outcome = state
        .engine
        .verify(AccountKey::new(request.account_key), &descriptor)
        .instrument(api_span("verify"))
        .await?;
    Ok(Json(outcome))
}

// ── Exists ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsRequest {
    pub account_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

pub async fn exists(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ExistsRequest>,
) -> Result<Json<ExistsResponse>, RpcError> {
    let exists = state
        .engine
        .account_exists(&AccountKey::new(request.account_key))
        .instrument(api_span("exists"))
        .await?;
    Ok(Json(ExistsResponse { exists }))
}

// ── Maintenance ──────────────────────────────────────────────────────────

pub async fn sync(State(state): State<Arc<ApiState>>) -> Result<Json<SyncReport>, RpcError> {
    let report = state
        .engine
        .sync_pending()
        .instrument(api_span("sync"))
        .await?;
    Ok(Json(report))
}

pub async fn status(State(state): State<Arc<ApiState>>) -> Result<Json<EngineStatus>, RpcError> {
    Ok(Json(state.engine.status().await?))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, RpcError> {
    if !state.enable_metrics {
        return Err(RpcError::MetricsDisabled);
    }
    let body = state
        .engine
        .metrics()
        .encode()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
