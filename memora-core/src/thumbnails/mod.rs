//! Thumbnail cache: a flat directory of `<id>.jpg` files plus the worker
//! queue that fills it.
//!
//! The file on disk is the only state. A present file is a cache hit and is
//! never re-validated against its source.

use std::path::PathBuf;

use crate::{identity::MediaId, media::MediaKind};

mod cache;
mod frames;
mod queue;

pub use cache::{ThumbnailCache, ThumbnailSettings};
pub use frames::{FfmpegFrameExtractor, FrameExtractor};
pub use queue::{ThumbnailQueue, ThumbnailQueueConfig};

/// A request to make sure a thumbnail exists for `id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailJob {
    pub id: MediaId,
    pub kind: MediaKind,
    pub source: PathBuf,
}

/// Receiver of thumbnail work. Implementations must return immediately.
pub trait ThumbnailSink: Send + Sync {
    fn request(&self, job: ThumbnailJob);
}

/// Sink that drops every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopThumbnailSink;

impl ThumbnailSink for NoopThumbnailSink {
    fn request(&self, _job: ThumbnailJob) {}
}
