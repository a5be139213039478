//! Axum-based identity API server.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use faceid_engine::IdentityResolutionEngine;

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
pub struct ApiState {
    pub engine: Arc<IdentityResolutionEngine>,
    pub enable_metrics: bool,
}

/// Build the identity API router.
pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .route("/identity/register", post(handlers::register))
        .route("/identity/verify", post(handlers::verify))
        .route("/identity/exists", post(handlers::exists))
        .route("/identity/sync", post(handlers::sync))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct ApiServer {
    pub port: u16,
    pub state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(port: u16, engine: Arc<IdentityResolutionEngine>, enable_metrics: bool) -> Self {
        Self {
            port,
            state: Arc::new(ApiState {
                engine,
                enable_metrics,
            }),
        }
    }

    /// Bind on all interfaces and serve until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "identity API listening");
        }
        axum::serve(listener, api_router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
