use std::sync::Arc;

use anyhow::{Context, Result};
use memora_core::{
    fs_watch::{MediaWatcher, prepare_root},
    index::MediaIndex,
    thumbnails::{FfmpegFrameExtractor, FrameExtractor, ThumbnailCache, ThumbnailQueue},
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::infra::{app_state::AppState, config::Config};

/// Everything the process keeps alive while serving.
#[derive(Debug)]
pub struct Services {
    pub state: AppState,
    pub watcher: MediaWatcher,
    pub dispatcher: JoinHandle<()>,
}

impl Services {
    pub fn shutdown(self) {
        self.watcher.shutdown();
        self.dispatcher.abort();
    }
}

/// Wire the index, watcher and thumbnail pipeline from a resolved config.
///
/// Pass `frames` to substitute the frame extractor; `None` probes the
/// configured ffmpeg binary.
pub async fn bootstrap(config: Config, frames: Option<Arc<dyn FrameExtractor>>) -> Result<Services> {
    let root = match prepare_root(&config.media.root).await {
        Ok(root) => root,
        Err(err) => {
            // The watcher repeats the attempt and stays inert; keep serving.
            error!(root = %config.media.root.display(), error = %err, "Media root unavailable");
            config.media.root.clone()
        }
    };

    let frames = match frames {
        Some(frames) => Some(frames),
        None => detect_frames(&config).await,
    };

    let cache = Arc::new(ThumbnailCache::new(
        config.cache.thumbnails.clone(),
        config.thumbnail_settings(),
        frames,
    ));
    cache
        .ensure_dir()
        .await
        .with_context(|| format!("thumbnail directory {}", config.cache.thumbnails.display()))?;

    let (queue, dispatcher) = ThumbnailQueue::spawn(Arc::clone(&cache), config.queue_config());
    let index = Arc::new(MediaIndex::new(root.clone(), Arc::new(queue)));
    let watcher = MediaWatcher::start(Arc::clone(&index), config.watch_config()).await;

    info!(
        root = %root.display(),
        thumbnails = %config.cache.thumbnails.display(),
        video_thumbnails = cache.supports_video(),
        "Media services ready"
    );

    Ok(Services {
        state: AppState::new(index, cache, Arc::new(config)),
        watcher,
        dispatcher,
    })
}

async fn detect_frames(config: &Config) -> Option<Arc<dyn FrameExtractor>> {
    match FfmpegFrameExtractor::detect(
        config.ffmpeg.ffmpeg_path.clone(),
        config.ffmpeg.ffprobe_path.clone(),
        config.extract_timeout(),
    )
    .await
    {
        Some(extractor) => Some(Arc::new(extractor)),
        None => {
            warn!(
                ffmpeg = %config.ffmpeg.ffmpeg_path,
                "ffmpeg not available; video thumbnails disabled"
            );
            None
        }
    }
}
