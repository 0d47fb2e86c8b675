use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub media: FileMediaConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub thumbnails: FileThumbnailConfig,
    #[serde(default)]
    pub watcher: FileWatcherConfig,
    #[serde(default)]
    pub ffmpeg: FileFfmpegConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileThumbnailConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWatcherConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_window_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFfmpegConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub media_root: Option<PathBuf>,
    pub thumbnail_dir: Option<PathBuf>,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty("MEMORA_CONFIG").map(PathBuf::from),
            server_host: non_empty("MEMORA_HOST"),
            server_port: non_empty("MEMORA_PORT").and_then(|s| s.parse().ok()),
            media_root: non_empty("MEDIA_ROOT").map(PathBuf::from),
            thumbnail_dir: non_empty("THUMBNAIL_DIR").map(PathBuf::from),
            ffmpeg_path: non_empty("FFMPEG_PATH"),
            ffprobe_path: non_empty("FFPROBE_PATH"),
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS").map(|raw| split_list(&raw)),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Split a comma separated env value, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
