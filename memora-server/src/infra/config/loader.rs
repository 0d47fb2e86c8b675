use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use super::{
    models::{
        CacheConfig, Config, ConfigMetadata, CorsConfig, FfmpegConfig, MediaConfig, ServerConfig,
        ThumbnailConfig, WatcherConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["memora.toml", "config/memora.toml"];

/// Values given on the command line. They beat every other source.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub media_root: Option<PathBuf>,
    pub thumbnail_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.options.overrides = overrides;
        self
    }

    /// Load `.env`, then resolve CLI > environment > TOML > defaults.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Resolve against an explicit environment snapshot. Does not touch
    /// the process environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        self.compose_config(file_config, env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let requested = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match requested {
            Some(path) if !path.exists() => return Err(ConfigLoadError::MissingConfig { path }),
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No memora.toml detected; using environment variables and defaults",
                "Create memora.toml or pass --config to pin settings",
            );
        }

        let defaults = Config::default();
        let overrides = &self.options.overrides;
        let FileConfig {
            server: file_server,
            media: file_media,
            cache: file_cache,
            thumbnails: file_thumbnails,
            watcher: file_watcher,
            ffmpeg: file_ffmpeg,
            cors: file_cors,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: overrides
                .host
                .clone()
                .or(env.server_host)
                .or(file_server.host)
                .unwrap_or(defaults.server.host),
            port: overrides
                .port
                .or(env.server_port)
                .or(file_server.port)
                .unwrap_or(defaults.server.port),
        };

        let media = MediaConfig {
            root: overrides
                .media_root
                .clone()
                .or(env.media_root)
                .or(file_media.root)
                .unwrap_or(defaults.media.root),
        };

        let cache = CacheConfig {
            thumbnails: overrides
                .thumbnail_dir
                .clone()
                .or(env.thumbnail_dir)
                .or(file_cache.thumbnails)
                .unwrap_or(defaults.cache.thumbnails),
        };

        let thumbnails = ThumbnailConfig {
            size: file_thumbnails.size.unwrap_or(defaults.thumbnails.size),
            quality: file_thumbnails.quality.unwrap_or(defaults.thumbnails.quality),
            seek_fraction: file_thumbnails
                .seek_fraction
                .unwrap_or(defaults.thumbnails.seek_fraction),
            workers: file_thumbnails.workers.unwrap_or(defaults.thumbnails.workers),
            queue_capacity: file_thumbnails
                .queue_capacity
                .unwrap_or(defaults.thumbnails.queue_capacity),
            extract_timeout_secs: file_thumbnails
                .extract_timeout_secs
                .unwrap_or(defaults.thumbnails.extract_timeout_secs),
        };

        let watcher = WatcherConfig {
            stability_window_ms: file_watcher
                .stability_window_ms
                .unwrap_or(defaults.watcher.stability_window_ms),
            poll_interval_ms: file_watcher
                .poll_interval_ms
                .unwrap_or(defaults.watcher.poll_interval_ms),
        };

        let ffmpeg = FfmpegConfig {
            ffmpeg_path: env
                .ffmpeg_path
                .or(file_ffmpeg.ffmpeg_path)
                .unwrap_or(defaults.ffmpeg.ffmpeg_path),
            ffprobe_path: env
                .ffprobe_path
                .or(file_ffmpeg.ffprobe_path)
                .unwrap_or(defaults.ffmpeg.ffprobe_path),
        };

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_default(),
        };

        let config = Config {
            server,
            media,
            cache,
            thumbnails,
            watcher,
            ffmpeg,
            cors,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok(ConfigLoad { config, warnings })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("memora.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .with_config_path(dir.path().join("nope.toml"))
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [server]
            port = 8080

            [media]
            root = "/srv/photos"

            [thumbnails]
            size = 320
            "#,
        );

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap();

        assert_eq!(load.config.server.port, 8080);
        assert_eq!(load.config.server.host, "0.0.0.0");
        assert_eq!(load.config.media.root, PathBuf::from("/srv/photos"));
        assert_eq!(load.config.thumbnails.size, 320);
        assert_eq!(load.config.thumbnails.quality, 80);
        assert_eq!(load.config.metadata.config_path, Some(path));
    }

    #[test]
    fn precedence_is_cli_then_env_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[server]\nport = 8080\nhost = \"127.0.0.1\"\n[media]\nroot = \"/from/file\"\n",
        );
        let env = EnvConfig {
            server_port: Some(9090),
            media_root: Some(PathBuf::from("/from/env")),
            ..EnvConfig::default()
        };

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .with_overrides(ConfigOverrides {
                port: Some(7070),
                ..ConfigOverrides::default()
            })
            .load_with_env(env)
            .unwrap();

        assert_eq!(load.config.server.port, 7070);
        assert_eq!(load.config.server.host, "127.0.0.1");
        assert_eq!(load.config.media.root, PathBuf::from("/from/env"));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[thumbnails]\nquality = 0\n");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::GuardRail(ConfigGuardRailError::QualityOutOfRange(0))
        ));
    }

    #[test]
    fn malformed_toml_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[server\nport = ");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { path: p, .. } if p == path));
    }
}
