use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::{routes, state::ApiState};
use crate::global::error::AppError;

/// Start the API server and serve until Ctrl+C
pub async fn start_api_server(state: ApiState, host: &str, port: u16) -> Result<(), AppError> {
    let app = create_app(state);

    let addr = format!("{}:{}", host, port);
    info!(address = %addr, "Starting API server");

    let listener = TcpListener::bind((host, port)).await?;

    info!(address = %addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "API server error");
            e.into()
        })
}

/// Create the Axum application with middleware
pub fn create_app(state: ApiState) -> Router {
    let router = routes::create_router(state);

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    warn!("Shutdown signal received, stopping API server");
}
