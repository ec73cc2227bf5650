//! HTTP server wiring
//!
//! Routes:
//! - `POST /debate/stream` - run a debate, streamed as SSE
//! - `GET  /api/models` - providers, key availability, defaults
//! - `GET  /health` - liveness and model configuration
//! - `GET|POST /history` - stored turns for a session

mod handlers;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/debate/stream", post(handlers::debate_stream_handler))
        .route("/api/models", get(handlers::models_handler))
        .route("/health", get(handlers::health_handler))
        .route(
            "/history",
            get(handlers::history_get_handler).post(handlers::history_post_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
