#![allow(dead_code)]

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum_test::TestServer;
use image::{ImageFormat, Rgb, RgbImage};
use memora_core::{
    index::MediaIndex,
    thumbnails::{NoopThumbnailSink, ThumbnailCache},
};
use memora_server::{
    create_app,
    infra::{app_state::AppState, config::Config},
};
use tempfile::TempDir;

/// A router over a temp media root and thumbnail dir. The index is driven
/// directly, without a watcher.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub root: PathBuf,
    _media: TempDir,
    _thumbs: TempDir,
}

impl TestApp {
    /// Write `bytes` at `rel` under the media root and index it.
    pub fn add_file(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        self.state.index.upsert(&path)?;
        Ok(())
    }
}

pub async fn build_test_app() -> Result<TestApp> {
    let media = tempfile::tempdir().context("failed to create media directory")?;
    let thumbs = tempfile::tempdir().context("failed to create thumbnail directory")?;
    let root = fs::canonicalize(media.path())?;

    let mut config = Config::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.media.root = root.clone();
    config.cache.thumbnails = thumbs.path().to_path_buf();

    let cache = Arc::new(ThumbnailCache::new(
        thumbs.path(),
        config.thumbnail_settings(),
        None,
    ));
    let index = Arc::new(MediaIndex::new(root.clone(), Arc::new(NoopThumbnailSink)));
    let state = AppState::new(index, cache, Arc::new(config));
    let server = TestServer::new(create_app(state.clone())).context("failed to start test server")?;

    Ok(TestApp {
        server,
        state,
        root,
        _media: media,
        _thumbs: thumbs,
    })
}

/// `len` bytes following a fixed pattern so slices can be checked.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|n| (n % 251) as u8).collect()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])))
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode test jpeg");
    out.into_inner()
}
