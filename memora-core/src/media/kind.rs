use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "opus"];

/// The three kinds of media the index accepts.
///
/// Anything else is "unknown" and is represented as `None` by [`classify`]
/// so callers can't accidentally index it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Whether the thumbnail cache can ever produce a thumbnail for this kind.
    pub fn has_thumbnail(&self) -> bool {
        !matches!(self, MediaKind::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an extension (with or without the leading dot), ignoring case.
pub fn classify(extension: &str) -> Option<MediaKind> {
    let ext = extension.strip_prefix('.').unwrap_or(extension).to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else {
        None
    }
}

/// Classify a path by its extension. Paths without one are unknown.
pub fn classify_path(path: &Path) -> Option<MediaKind> {
    path.extension().and_then(|ext| ext.to_str()).and_then(classify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        assert_eq!(classify("JPG"), Some(MediaKind::Image));
        assert_eq!(classify(".Mov"), Some(MediaKind::Video));
        assert_eq!(classify("FLAC"), Some(MediaKind::Audio));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert_eq!(classify("txt"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify_path(Path::new("notes.txt")), None);
        assert_eq!(classify_path(Path::new("README")), None);
    }

    #[test]
    fn classifies_nested_paths() {
        assert_eq!(
            classify_path(Path::new("trips/2023/clip.MP4")),
            Some(MediaKind::Video)
        );
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
    }
}
