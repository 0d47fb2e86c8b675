use std::{fs::Metadata, time::SystemTime};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::kind::MediaKind;
use crate::{
    identity::{MediaId, identify},
    paths::{THUMBNAIL_URL_PREFIX, media_url},
};

/// One indexed media file, as returned by `GET /api/memories`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: MediaId,
    pub relative_path: String,
    pub name: String,
    pub kind: MediaKind,
    pub created_at_date: NaiveDate,
    pub modified_at_epoch_millis: i64,
    pub size_bytes: u64,
    pub media_url: String,
    pub thumbnail_url: String,
}

impl MediaItem {
    /// Build a fresh item from a relative key and the file's metadata.
    ///
    /// Every field is derived here; items are never patched in place.
    pub fn from_metadata(relative_path: &str, kind: MediaKind, metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Self::new(relative_path, kind, DateTime::<Utc>::from(modified), metadata.len())
    }

    pub fn new(relative_path: &str, kind: MediaKind, modified: DateTime<Utc>, size_bytes: u64) -> Self {
        let id = identify(relative_path);
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();

        Self {
            thumbnail_url: format!("{THUMBNAIL_URL_PREFIX}/{id}"),
            media_url: media_url(relative_path),
            id,
            relative_path: relative_path.to_string(),
            name,
            kind,
            created_at_date: modified.date_naive(),
            modified_at_epoch_millis: modified.timestamp_millis(),
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn derives_every_field_from_the_path_and_stat() {
        let modified = Utc.with_ymd_and_hms(2024, 7, 14, 18, 30, 0).unwrap();
        let item = MediaItem::new("trips/nice 2024/IMG 1.jpg", MediaKind::Image, modified, 2048);

        assert_eq!(item.name, "IMG 1.jpg");
        assert_eq!(item.id, identify("trips/nice 2024/IMG 1.jpg"));
        assert_eq!(item.media_url, "/media/trips/nice%202024/IMG%201.jpg");
        assert_eq!(item.thumbnail_url, format!("/api/thumbnail/{}", item.id));
        assert_eq!(item.created_at_date.to_string(), "2024-07-14");
        assert_eq!(item.modified_at_epoch_millis, modified.timestamp_millis());
        assert_eq!(item.size_bytes, 2048);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let modified = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let json = serde_json::to_value(MediaItem::new("song.mp3", MediaKind::Audio, modified, 1))
            .unwrap();

        assert_eq!(json["kind"], "audio");
        assert_eq!(json["relativePath"], "song.mp3");
        assert_eq!(json["createdAtDate"], "2023-01-02");
        assert_eq!(json["modifiedAtEpochMillis"], modified.timestamp_millis());
        assert_eq!(json["sizeBytes"], 1);
        assert!(json["mediaUrl"].is_string());
        assert!(json["thumbnailUrl"].is_string());
    }
}
