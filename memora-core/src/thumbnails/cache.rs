use std::{
    fmt,
    fs::File,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{DynamicImage, ImageReader, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tracing::{debug, info, warn};

use super::frames::FrameExtractor;
use crate::{
    error::{MediaError, Result},
    identity::MediaId,
    media::MediaKind,
};

/// Output parameters shared by every generated thumbnail.
#[derive(Clone, Debug)]
pub struct ThumbnailSettings {
    /// Edge length of the square thumbnail, in pixels.
    pub size: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Fraction of the video's duration at which a frame is captured.
    pub seek_fraction: f64,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            size: 200,
            quality: 80,
            seek_fraction: 0.1,
        }
    }
}

/// Owns the thumbnail directory and knows how to fill one slot.
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    settings: ThumbnailSettings,
    frames: Option<Arc<dyn FrameExtractor>>,
}

impl fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("cache_dir", &self.cache_dir)
            .field("settings", &self.settings)
            .field("frame_extraction", &self.frames.is_some())
            .finish()
    }
}

impl ThumbnailCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        settings: ThumbnailSettings,
        frames: Option<Arc<dyn FrameExtractor>>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            settings,
            frames,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn supports_video(&self) -> bool {
        self.frames.is_some()
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await.map_err(|err| {
            MediaError::Internal(format!(
                "failed to create thumbnail dir {:?}: {err}",
                self.cache_dir
            ))
        })
    }

    /// Get the path of the cache slot for `id`
    pub fn path_for(&self, id: &MediaId) -> PathBuf {
        self.cache_dir.join(format!("{id}.jpg"))
    }

    /// Check if a thumbnail is already cached
    pub async fn has_thumbnail(&self, id: &MediaId) -> bool {
        tokio::fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }

    /// Make sure a thumbnail exists for `id`. Best effort: failures are
    /// logged and reported as `false`, never raised.
    pub async fn ensure_thumbnail(&self, source: &Path, id: &MediaId, kind: MediaKind) -> bool {
        if self.has_thumbnail(id).await {
            debug!(id = %id, "Thumbnail already cached");
            return true;
        }

        let result = match kind {
            MediaKind::Audio => return false,
            MediaKind::Image => self.generate_from_image(source, id).await,
            MediaKind::Video => match &self.frames {
                Some(frames) => self.generate_from_video(frames.as_ref(), source, id).await,
                None => {
                    debug!(id = %id, "Skipping video thumbnail: frame extraction unavailable");
                    return false;
                }
            },
        };

        match result {
            Ok(()) => {
                info!(id = %id, kind = %kind, "Thumbnail generated");
                true
            }
            Err(err) => {
                warn!(id = %id, source = %source.display(), error = %err, "Failed to generate thumbnail");
                false
            }
        }
    }

    async fn generate_from_image(&self, source: &Path, id: &MediaId) -> Result<()> {
        let source = source.to_path_buf();
        let output = self.path_for(id);
        let settings = self.settings.clone();

        run_blocking(move || {
            // Sniff the header; extensions lie.
            let decoded = ImageReader::open(&source)?.with_guessed_format()?.decode()?;
            write_thumbnail(&decoded, &output, &settings)
        })
        .await
    }

    async fn generate_from_video(
        &self,
        frames: &dyn FrameExtractor,
        source: &Path,
        id: &MediaId,
    ) -> Result<()> {
        let frame = frames.extract_frame(source, self.settings.seek_fraction).await?;
        let output = self.path_for(id);
        let settings = self.settings.clone();

        run_blocking(move || {
            let decoded = image::load_from_memory(&frame)?;
            write_thumbnail(&decoded, &output, &settings)
        })
        .await
    }
}

async fn run_blocking<F>(work: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| MediaError::Generation(format!("thumbnail task panicked: {err}")))?
}

/// Cover-fit `image` into the configured square and store it as JPEG.
fn write_thumbnail(image: &DynamicImage, output: &Path, settings: &ThumbnailSettings) -> Result<()> {
    let fitted = image
        .resize_to_fill(settings.size, settings.size, FilterType::Lanczos3)
        .to_rgb8();

    let mut encoded = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut encoded, settings.quality).encode_image(&fitted)?;
    atomic_write(output, encoded.get_ref())
}

/// Write to a sibling temp file, fsync, then rename over the destination.
///
/// Readers either see no file or a complete one. Concurrent writers to the
/// same slot each rename a complete file, so the last one wins intact.
fn atomic_write(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = output.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    })();
    if let Err(err) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    if let Err(err) = std::fs::rename(&tmp_path, output) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}
