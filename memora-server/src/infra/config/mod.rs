pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions, ConfigOverrides};
pub use models::{
    CacheConfig, Config, ConfigMetadata, CorsConfig, FfmpegConfig, MediaConfig, ServerConfig,
    ThumbnailConfig, WatcherConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
