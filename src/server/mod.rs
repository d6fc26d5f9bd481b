//! HTTP API server.
//!
//! Exposes the chat service over REST, with server-sent events for streamed
//! answers. Failures are reported as `application/problem+json` documents.

mod handlers;
pub mod problem;

pub use handlers::AppState;
pub use problem::ProblemDetails;

use crate::error::Result;
use crate::rag::ChatService;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the API router around a chat service.
pub fn router(service: ChatService) -> Router {
    let state = Arc::new(AppState { service });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat/ask", post(handlers::ask))
        .route("/api/chat/stream", post(handlers::stream))
        .route("/api/chat/{conversation_id}", delete(handlers::delete))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on an already bound listener until Ctrl+C.
pub async fn serve(listener: TcpListener, service: ChatService) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
