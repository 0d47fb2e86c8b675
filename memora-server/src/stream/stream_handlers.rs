use std::{io::SeekFrom, path::Path as FsPath};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use memora_core::paths::resolve_existing_file;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::range::{RangeRequest, parse_range_header};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Read size for streamed bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// `GET /media/{*path}`
pub async fn media_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    serve(state.media_root(), &path, headers.get(header::RANGE)).await
}

/// Stream `requested` (root-relative, already percent-decoded) from `root`,
/// honoring a single-range `Range` header.
pub async fn serve(root: &FsPath, requested: &str, range: Option<&HeaderValue>) -> AppResult<Response> {
    let file_path = resolve_existing_file(root, requested).await?;

    let mut file = File::open(&file_path)
        .await
        .map_err(|_| AppError::not_found("Media file not found"))?;
    let file_size = file
        .metadata()
        .await
        .map_err(|err| AppError::internal(format!("Failed to read file metadata: {err}")))?
        .len();
    let content_type = content_type_for(&file_path);

    let request = range
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_range_header(value, file_size))
        .unwrap_or(RangeRequest::Full);

    match request {
        RangeRequest::Full => {
            let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));
            build_response(StatusCode::OK, content_type, file_size, None, body)
        }
        RangeRequest::Partial(range) => {
            debug!(
                path = %requested,
                start = range.start,
                end = range.end,
                size = file_size,
                "Range request"
            );
            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(|err| AppError::internal(format!("Failed to seek in file: {err}")))?;
            let slice = file.take(range.content_length());
            let body = Body::from_stream(ReaderStream::with_capacity(slice, CHUNK_SIZE));
            build_response(
                StatusCode::PARTIAL_CONTENT,
                content_type,
                range.content_length(),
                Some(range.content_range(file_size)),
                body,
            )
        }
        RangeRequest::Unsatisfiable => {
            debug!(path = %requested, size = file_size, "Unsatisfiable range");
            Err(AppError::range_not_satisfiable(file_size)
                .with_header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes")))
        }
    }
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> AppResult<Response> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    builder
        .body(body)
        .map_err(|err| AppError::internal(format!("Failed to build response: {err}")))
}

/// Best-effort MIME type from the file extension.
pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("m4v") => "video/x-m4v",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("ogg") => "audio/ogg",
        Some("opus") => "audio/opus",
        _ => "application/octet-stream",
    }
}
