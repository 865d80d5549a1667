//! HTTP API for Meridian.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/v1/analyze` - Run an analysis for a subject and index it
//! - `GET /api/v1/reports/{subject}` - Latest report for a subject
//! - `POST /api/v1/chat` - Follow-up question about an indexed analysis
//!
//! ```text
//! Client
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API (Axum)    │
//! └────────┬────────┘
//!          ├──────────────────┬──────────────────┐
//!          ▼                  ▼                  ▼
//!    Orchestrator       ReportIndexer       ChatService
//! ```

pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/analyze", post(routes::analyze))
        .route("/api/v1/reports/{subject}", get(routes::get_report))
        .route("/api/v1/chat", post(routes::chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
///
/// Returns after ctrl-c once the orchestrator's in-flight work is drained.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state.clone());

    info!(%addr, "Starting Meridian API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.orchestrator.shutdown().await;
    info!("Server stopped");
    Ok(())
}
