//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression and all
//! endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use wayfarer_core::error::WayfarerError;

use crate::handlers;
use crate::state::AppState;

/// Request bodies carry a single chat message.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.host, state.config.server.port);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/turns", post(handlers::post_turn))
        .route("/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Allow browser clients served from the API's own host and port.
fn cors_layer(host: &str, port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [host, "127.0.0.1", "localhost"]
        .iter()
        .filter_map(|h| match format!("http://{}:{}", h, port).parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(_) => {
                warn!(host = h, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), WayfarerError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WayfarerError::Server(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WayfarerError::Server(format!("Server error: {}", e)))?;

    info!("API server stopped");
    Ok(())
}
