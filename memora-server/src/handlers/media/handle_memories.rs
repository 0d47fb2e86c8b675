use axum::{Json, extract::State};
use memora_core::MediaItem;
use serde::{Deserialize, Serialize};

use crate::infra::app_state::AppState;

/// Cheap change marker for polling clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    /// Epoch millis of the last index change.
    pub last_update: i64,
}

/// GET /api/memories - every indexed item, most recently modified first.
pub async fn list_memories_handler(State(state): State<AppState>) -> Json<Vec<MediaItem>> {
    Json(state.index.list())
}

/// GET /api/media-status
pub async fn media_status_handler(State(state): State<AppState>) -> Json<MediaStatus> {
    Json(MediaStatus {
        last_update: state.index.last_update_millis(),
    })
}
