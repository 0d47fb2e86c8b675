use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use memora_core::{
    fs_watch::WatchConfig,
    thumbnails::{ThumbnailQueueConfig, ThumbnailSettings},
};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub thumbnails: ThumbnailConfig,
    pub watcher: WatcherConfig,
    pub ffmpeg: FfmpegConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub thumbnails: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub size: u32,
    pub quality: u8,
    pub seek_fraction: f64,
    pub workers: usize,
    pub queue_capacity: usize,
    pub extract_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub stability_window_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

/// Where the configuration came from, for startup logging.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3300,
            },
            media: MediaConfig {
                root: PathBuf::from("./media"),
            },
            cache: CacheConfig {
                thumbnails: PathBuf::from("./thumbnails"),
            },
            thumbnails: ThumbnailConfig::default(),
            watcher: WatcherConfig::default(),
            ffmpeg: FfmpegConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
            },
            cors: CorsConfig::default(),
            metadata: ConfigMetadata::default(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        let settings = ThumbnailSettings::default();
        let queue = ThumbnailQueueConfig::default();
        Self {
            size: settings.size,
            quality: settings.quality,
            seek_fraction: settings.seek_fraction,
            workers: queue.workers,
            queue_capacity: queue.capacity,
            extract_timeout_secs: 30,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid server host {:?}: {err}", self.server.host))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn thumbnail_settings(&self) -> ThumbnailSettings {
        ThumbnailSettings {
            size: self.thumbnails.size,
            quality: self.thumbnails.quality,
            seek_fraction: self.thumbnails.seek_fraction,
        }
    }

    pub fn queue_config(&self) -> ThumbnailQueueConfig {
        ThumbnailQueueConfig {
            capacity: self.thumbnails.queue_capacity,
            workers: self.thumbnails.workers,
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            stability_window: Duration::from_millis(self.watcher.stability_window_ms),
            poll_interval: Duration::from_millis(self.watcher.poll_interval_ms.max(1)),
            ..WatchConfig::default()
        }
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.thumbnails.extract_timeout_secs)
    }
}
