use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed request path (empty, not valid UTF-8, bad identifier).
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The request resolved outside the served root.
    #[error("Path escapes root: {0}")]
    PathEscape(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Requested range not satisfiable for {size} byte resource")]
    RangeNotSatisfiable { size: u64 },

    /// Thumbnail decode/encode/extraction failure. Never fatal.
    #[error("Thumbnail generation failed: {0}")]
    Generation(String),

    #[error("Watch setup failed: {0}")]
    WatchSetup(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
