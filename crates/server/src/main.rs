//! HTTP + WebSocket Server
//!
//! Serves the run API and field streams for the heat diffusion visualizer.

use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug,orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting heat diffusion server");

    // Get port from environment or default to 3000
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let configs_dir = std::env::var("CONFIGS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("configs"));
    let frontend_dist = PathBuf::from("frontend/dist");

    if !configs_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&configs_dir) {
            tracing::error!("Failed to create configs directory {:?}: {}", configs_dir, e);
            return;
        }
    }

    let state = Arc::new(AppState::new(configs_dir, port));
    let app = server::app(state);

    // Add static file serving if frontend dist exists
    let app = if frontend_dist.exists() {
        tracing::info!("Serving frontend from {:?}", frontend_dist);
        app.fallback_service(ServeDir::new(frontend_dist))
    } else {
        tracing::warn!("Frontend dist directory not found at {:?}", frontend_dist);
        app
    };

    let addr = format!("127.0.0.1:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
