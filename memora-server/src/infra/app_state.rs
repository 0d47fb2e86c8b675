use std::{fmt, path::Path, sync::Arc};

use memora_core::{index::MediaIndex, thumbnails::ThumbnailCache};

use crate::infra::config::Config;

/// Shared handles every request handler works from.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<MediaIndex>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("media_root", &self.index.root())
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(index: Arc<MediaIndex>, thumbnails: Arc<ThumbnailCache>, config: Arc<Config>) -> Self {
        Self {
            index,
            thumbnails,
            config,
        }
    }

    /// The canonical media root the index and streamer agree on.
    pub fn media_root(&self) -> &Path {
        self.index.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
