//! HTTP + WebSocket front end for coupled heat runs
//!
//! The server plays the rendering-sink role for a browser visualizer:
//! configurations are listed and started over the REST API, and each run's
//! partition fields are streamed as tagged binary messages over a WebSocket.

#![warn(missing_docs)]

pub mod api;
pub mod state;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use state::AppState;

/// Build the application router over `state`.
pub fn app(state: Arc<AppState>) -> Router {
    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/configs", get(api::list_configs))
        .route("/configs/:name", get(api::get_config))
        .route("/simulations", post(api::create_simulation))
        .route(
            "/simulations/:id",
            get(api::get_simulation).delete(api::delete_simulation),
        )
        .route("/simulations/:id/profiles", get(api::get_profiles));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .route("/ws/simulation/:id", get(ws::ws_simulation_handler))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

async fn health_handler() -> &'static str {
    "OK"
}
