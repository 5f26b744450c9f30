mod config;
mod room;
mod signaling;

pub use config::ServerConfig;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the HTTP router: `/ws` for signaling, `/health` for probes.
pub fn router(service: SignalingService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves signaling on an already bound listener until the server stops.
pub async fn serve_with_listener(listener: TcpListener, service: SignalingService) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Signaling server listening on ws://{}/ws", addr);

    axum::serve(listener, router(service))
        .await
        .context("signaling server terminated")
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    let service = SignalingService::new(RoomDirectory::new(config.room_channel_capacity));
    serve_with_listener(listener, service).await
}
