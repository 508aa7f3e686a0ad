use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::{api, websocket};
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/ws", get(websocket::ws_handler))
        .route("/api/alerts/active", get(api::get_active_alert))
        .route("/api/alerts/queue", get(api::get_queue))
        .route("/api/overlay/configure", post(api::configure_overlay))
        .route("/api/settings", get(api::get_settings))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
