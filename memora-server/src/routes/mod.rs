use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use memora_core::paths::{MEDIA_URL_PREFIX, THUMBNAIL_URL_PREFIX};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

use crate::{
    handlers::{list_memories_handler, media_status_handler, thumbnail_handler},
    infra::{app_state::AppState, config::CorsConfig},
    stream::media_handler,
};

pub const MEMORIES: &str = "/api/memories";
pub const MEDIA_STATUS: &str = "/api/media-status";
pub const PING: &str = "/ping";

/// Build the complete application router.
pub fn create_app(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config().cors);

    Router::new()
        .route(PING, get(ping_handler))
        .route(MEMORIES, get(list_memories_handler))
        .route(MEDIA_STATUS, get(media_status_handler))
        .route(&format!("{THUMBNAIL_URL_PREFIX}/{{id}}"), get(thumbnail_handler))
        .route(&format!("{MEDIA_URL_PREFIX}/{{*path}}"), get(media_handler))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
}

async fn ping_handler() -> Json<Value> {
    debug!("Ping endpoint called");
    Json(json!({
        "status": "ok",
        "message": "Memora media server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
