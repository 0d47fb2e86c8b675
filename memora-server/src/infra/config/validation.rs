use std::path::{Path, PathBuf};

use thiserror::Error;

use super::models::Config;

/// A configuration value the server refuses to start with.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigGuardRailError {
    #[error("thumbnails.size must be greater than zero")]
    ZeroThumbnailSize,
    #[error("thumbnails.quality must be between 1 and 100 (got {0})")]
    QualityOutOfRange(u8),
    #[error("thumbnails.seek_fraction must be in [0, 1) (got {0})")]
    SeekFractionOutOfRange(f64),
    #[error("thumbnails.workers must be at least 1")]
    NoWorkers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

/// Non-fatal findings, reported once at startup.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(&mut self, message: impl Into<String>, hint: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let thumbs = &config.thumbnails;
    if thumbs.size == 0 {
        return Err(ConfigGuardRailError::ZeroThumbnailSize);
    }
    if !(1..=100).contains(&thumbs.quality) {
        return Err(ConfigGuardRailError::QualityOutOfRange(thumbs.quality));
    }
    if !(0.0..1.0).contains(&thumbs.seek_fraction) {
        return Err(ConfigGuardRailError::SeekFractionOutOfRange(thumbs.seek_fraction));
    }
    if thumbs.workers == 0 {
        return Err(ConfigGuardRailError::NoWorkers);
    }

    let mut warnings = ConfigWarnings::default();

    if nested_in(&config.cache.thumbnails, &config.media.root) {
        warnings.push_with_hint(
            format!(
                "Thumbnail directory {} is inside the media root {}",
                config.cache.thumbnails.display(),
                config.media.root.display()
            ),
            "Generated thumbnails will be indexed as media; move cache.thumbnails outside media.root",
        );
    }
    if thumbs.extract_timeout_secs == 0 {
        warnings.push("thumbnails.extract_timeout_secs is 0; every video thumbnail will time out");
    }

    Ok(warnings)
}

fn nested_in(child: &Path, parent: &Path) -> bool {
    let absolute = |path: &Path| std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path));
    absolute(child).starts_with(absolute(parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_without_warnings() {
        let warnings = apply_guard_rails(&Config::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.thumbnails.quality = 0;
        assert_eq!(
            apply_guard_rails(&config).unwrap_err(),
            ConfigGuardRailError::QualityOutOfRange(0)
        );

        let mut config = Config::default();
        config.thumbnails.seek_fraction = 1.0;
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::SeekFractionOutOfRange(_))
        ));

        let mut config = Config::default();
        config.thumbnails.size = 0;
        assert_eq!(
            apply_guard_rails(&config).unwrap_err(),
            ConfigGuardRailError::ZeroThumbnailSize
        );

        let mut config = Config::default();
        config.thumbnails.workers = 0;
        assert_eq!(apply_guard_rails(&config).unwrap_err(), ConfigGuardRailError::NoWorkers);
    }

    #[test]
    fn warns_when_thumbnails_live_inside_the_media_root() {
        let mut config = Config::default();
        config.media.root = PathBuf::from("./library");
        config.cache.thumbnails = PathBuf::from("./library/.thumbs");

        let warnings = apply_guard_rails(&config).unwrap();
        assert_eq!(warnings.iter().count(), 1);
        assert!(warnings.iter().all(|w| w.hint.is_some()));
    }
}
