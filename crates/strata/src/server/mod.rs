//! JSON-over-HTTP daemon exposing the memory registry
//!
//! The agent pipeline runs out of process and talks to a single daemon,
//! which owns every tenant and persists them on shutdown.

pub mod handlers;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::memory::MemoryRegistry;
use crate::query::DiverseQueryEngine;

/// Shared application state for all handlers
pub struct AppState {
    pub registry: Arc<MemoryRegistry>,
    pub engine: Arc<DiverseQueryEngine>,
    /// Root used by `/persist/save` and `/persist/load`
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<DiverseQueryEngine>, config: &Config) -> Self {
        Self {
            registry: Arc::clone(engine.registry()),
            engine,
            data_dir: config.storage.data_dir.clone(),
            request_timeout: Duration::from_secs(config.server.timeout_secs),
        }
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = state.request_timeout;

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stats", get(handlers::stats_handler))
        .route(
            "/memory/{symbol}/{memory_type}",
            post(handlers::add_memory_handler),
        )
        .route(
            "/memory/{symbol}/{memory_type}/query",
            post(handlers::query_memory_handler),
        )
        .route(
            "/memory/{symbol}/{memory_type}/recent",
            post(handlers::add_recent_handler).get(handlers::get_recent_handler),
        )
        .route("/query/diverse", post(handlers::diverse_query_handler))
        .route("/query/recall", post(handlers::recall_handler))
        .route("/persist/save", post(handlers::save_handler))
        .route("/persist/load", post(handlers::load_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

/// Error wrapper that renders `{"error": {"type", "message"}}`
#[derive(Debug)]
pub struct ApiError(pub StrataError);

impl From<StrataError> for ApiError {
    fn from(e: StrataError) -> Self {
        ApiError(e)
    }
}

// Malformed bodies and query strings share the error envelope
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(StrataError::InvalidArgument(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(StrataError::InvalidArgument(rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            StrataError::DimensionMismatch { .. } => (StatusCode::BAD_REQUEST, "dimension_mismatch"),
            StrataError::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            StrataError::InvalidMemoryType(_) => (StatusCode::BAD_REQUEST, "invalid_memory_type"),
            StrataError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            StrataError::UnknownSymbol(_) => (StatusCode::NOT_FOUND, "unknown_symbol"),
            StrataError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            StrataError::IndexSearchFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_search_failure")
            }
            StrataError::TenantLoadFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "tenant_load_failure")
            }
            StrataError::Storage(_) | StrataError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            StrataError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            StrataError::Config(_) | StrataError::Server(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = serde_json::json!({
            "error": {
                "type": error_type,
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// The memory daemon
pub struct MemoryServer {
    config: Config,
    state: Arc<AppState>,
}

impl MemoryServer {
    pub fn new(config: Config, engine: Arc<DiverseQueryEngine>) -> Self {
        let state = Arc::new(AppState::new(engine, &config));
        Self { config, state }
    }

    /// Listen until Ctrl+C or SIGTERM, then optionally persist all tenants
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| StrataError::Config(format!("Invalid listen address: {e}")))?;

        let app = create_router(Arc::clone(&self.state));

        tracing::info!("Starting memory server on {addr}");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StrataError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| StrataError::Server(format!("Server error: {e}")))?;

        if self.config.storage.save_on_shutdown {
            let report = self.state.registry.save_local(&self.state.data_dir).await?;
            if !report.is_complete() {
                tracing::warn!("{} tenants failed to save on shutdown", report.failed.len());
            }
        }

        tracing::info!("Memory server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
