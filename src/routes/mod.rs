//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The stats WebSocket is served at `/` (what existing consoles connect to)
//! and at `/ws`. A few small JSON endpoints expose one-shot device facts.
//! CORS is open because the console is served from the camera's own web
//! server on a different port.

pub mod api;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(ws::handle_ws))
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .route("/api/system", get(api::system))
        .route("/api/cgi", get(api::cgi))
        .route("/api/processes", get(api::processes))
        .route("/api/storage", get(api::storage))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
