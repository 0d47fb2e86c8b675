use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use memora_core::identity::MediaId;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=3600";

/// GET /api/thumbnail/{id} - the cached JPEG, or 404 until one exists.
///
/// Nothing is generated on this path; a miss is expected while the queue
/// catches up and permanent for audio. Ids that can't name a cache file are
/// misses too.
pub async fn thumbnail_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = MediaId::parse(&id).map_err(|_| AppError::not_found("Thumbnail not found"))?;
    let path = state.thumbnails.path_for(&id);

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found("Thumbnail not found"));
        }
        Err(err) => return Err(AppError::internal(format!("Failed to open thumbnail: {err}"))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|err| AppError::internal(format!("Failed to read thumbnail metadata: {err}")))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, size)
        .header(header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| AppError::internal(format!("Failed to build response: {err}")))
}
