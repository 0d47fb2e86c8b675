use std::{fs, time::Duration};

use axum::http::{StatusCode, header};
use axum_test::TestServer;
use memora_core::{MediaItem, MediaKind};
use memora_server::{
    create_app,
    infra::{config::Config, startup::bootstrap},
};

#[path = "support/mod.rs"]
mod support;

use support::jpeg_bytes;

async fn memories(server: &TestServer) -> Vec<MediaItem> {
    server.get("/api/memories").await.json()
}

#[tokio::test]
async fn dropped_photo_is_listed_thumbnailed_and_then_forgotten() {
    let media = tempfile::tempdir().unwrap();
    let thumbs = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.media.root = media.path().to_path_buf();
    config.cache.thumbnails = thumbs.path().to_path_buf();
    config.watcher.stability_window_ms = 300;
    config.watcher.poll_interval_ms = 50;
    config.ffmpeg.ffmpeg_path = "/nonexistent/ffmpeg-for-memora-tests".into();

    let services = bootstrap(config, None).await.unwrap();
    let server = TestServer::new(create_app(services.state.clone())).unwrap();
    let root = services.state.media_root().to_path_buf();

    fs::write(root.join("photo1.jpg"), jpeg_bytes(640, 480)).unwrap();
    fs::write(root.join("notes.txt"), b"never listed").unwrap();

    let mut photo = None;
    for _ in 0..200 {
        photo = memories(&server)
            .await
            .into_iter()
            .find(|item| item.name == "photo1.jpg");
        if photo.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let photo = photo.expect("photo1.jpg was never indexed");
    assert_eq!(photo.kind, MediaKind::Image);

    let thumb_url = photo.thumbnail_url.clone();
    let mut status = StatusCode::NOT_FOUND;
    for _ in 0..200 {
        status = server.get(&thumb_url).await.status_code();
        if status == StatusCode::OK {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status, StatusCode::OK);
    let response = server.get(&thumb_url).await;
    assert_eq!(response.header(header::CONTENT_TYPE), "image/jpeg");
    let decoded = image::load_from_memory(response.as_bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));

    fs::remove_file(root.join("photo1.jpg")).unwrap();
    let mut gone = false;
    for _ in 0..200 {
        if memories(&server).await.iter().all(|item| item.name != "photo1.jpg") {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(gone, "photo1.jpg was never removed");

    // Cached thumbnails outlive their source.
    server.get(&thumb_url).await.assert_status_ok();
    assert!(memories(&server).await.iter().all(|item| item.name != "notes.txt"));

    services.shutdown();
}

#[tokio::test]
async fn missing_media_root_is_created() {
    let base = tempfile::tempdir().unwrap();
    let thumbs = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.media.root = base.path().join("not-yet");
    config.cache.thumbnails = thumbs.path().to_path_buf();
    config.ffmpeg.ffmpeg_path = "/nonexistent/ffmpeg-for-memora-tests".into();

    let services = bootstrap(config, None).await.unwrap();
    assert!(base.path().join("not-yet").is_dir());
    assert!(services.watcher.is_active());
    assert!(services.state.index.is_empty());
    services.shutdown();
}
