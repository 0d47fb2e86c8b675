//! In-memory media index keyed by root-relative path.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    error::{MediaError, Result},
    media::{MediaItem, classify_path},
    paths::{is_hidden, relative_key},
    thumbnails::{ThumbnailJob, ThumbnailSink},
};

/// The single source of truth for what media exists under the root.
///
/// All mutation goes through one lock; readers get cloned snapshots, so a
/// listing never observes a half-applied update.
pub struct MediaIndex {
    root: PathBuf,
    entries: RwLock<HashMap<String, MediaItem>>,
    last_update_millis: AtomicI64,
    thumbnails: Arc<dyn ThumbnailSink>,
}

impl fmt::Debug for MediaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MediaIndex");
        debug.field("root", &self.root);
        match self.entries.try_read() {
            Some(guard) => debug.field("entries", &guard.len()),
            None => debug.field("entries", &"<locked>"),
        };
        debug
            .field("last_update_millis", &self.last_update_millis.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MediaIndex {
    pub fn new(root: impl Into<PathBuf>, thumbnails: Arc<dyn ThumbnailSink>) -> Self {
        Self {
            root: root.into(),
            entries: RwLock::new(HashMap::new()),
            last_update_millis: AtomicI64::new(Utc::now().timestamp_millis()),
            thumbnails,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index (or re-index) the file at `path`.
    ///
    /// Returns `Ok(None)` for paths that are not indexable: outside the root,
    /// hidden, directories, or of an unknown kind. A replaced entry is
    /// rebuilt from scratch. Thumbnail work is handed off, never awaited.
    /// Symlinks are not followed.
    ///
    /// Stats the file synchronously; async callers should go through
    /// `spawn_blocking`.
    pub fn upsert(&self, path: &Path) -> Result<Option<MediaItem>> {
        let Some(relative) = relative_key(&self.root, path) else {
            debug!(path = %path.display(), "ignoring path outside media root");
            return Ok(None);
        };
        if is_hidden(&self.root, path) {
            return Ok(None);
        }
        let Some(kind) = classify_path(path) else {
            return Ok(None);
        };

        let metadata = std::fs::symlink_metadata(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => MediaError::NotFound(relative.clone()),
            _ => MediaError::Io(err),
        })?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let item = MediaItem::from_metadata(&relative, kind, &metadata);
        let replaced = self.entries.write().insert(relative.clone(), item.clone());
        self.touch();

        if replaced.is_some() {
            info!(path = %relative, id = %item.id, "Updated");
        } else {
            info!(path = %relative, id = %item.id, kind = %kind, "Added");
        }

        self.thumbnails.request(ThumbnailJob {
            id: item.id.clone(),
            kind,
            source: path.to_path_buf(),
        });

        Ok(Some(item))
    }

    /// Drop the entry for `path`, if any. Cached thumbnails are left alone.
    pub fn remove(&self, path: &Path) -> Option<MediaItem> {
        let relative = relative_key(&self.root, path)?;
        let removed = self.entries.write().remove(&relative);
        if let Some(item) = &removed {
            self.touch();
            info!(path = %relative, id = %item.id, "Removed");
        }
        removed
    }

    /// Drop every entry located beneath the directory `dir`.
    pub fn remove_under(&self, dir: &Path) -> usize {
        let removed = match relative_key(&self.root, dir) {
            Some(prefix) => {
                let prefix = format!("{prefix}/");
                let mut guard = self.entries.write();
                let before = guard.len();
                guard.retain(|key, _| !key.starts_with(&prefix));
                before - guard.len()
            }
            None if dir == self.root => {
                let mut guard = self.entries.write();
                let count = guard.len();
                guard.clear();
                count
            }
            None => 0,
        };

        if removed > 0 {
            self.touch();
            info!(dir = %dir.display(), count = removed, "Removed directory entries");
        }
        removed
    }

    /// Drop entries whose files no longer exist on disk.
    ///
    /// Blocking: stats every entry, outside the lock.
    pub fn prune_missing(&self) -> usize {
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        let missing: Vec<String> = keys
            .into_iter()
            .filter(|key| !is_regular_file(&self.root.join(key)))
            .collect();
        let mut removed = 0;
        for key in missing {
            if self.remove(&self.root.join(&key)).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Point-in-time snapshot, most recently modified first.
    pub fn list(&self) -> Vec<MediaItem> {
        let mut items: Vec<MediaItem> = self.entries.read().values().cloned().collect();
        items.sort_by(|a, b| {
            b.modified_at_epoch_millis
                .cmp(&a.modified_at_epoch_millis)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        items
    }

    pub fn get(&self, relative_path: &str) -> Option<MediaItem> {
        self.entries.read().get(relative_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wall-clock time of the last change to the index.
    pub fn last_update(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_update_millis()).unwrap_or_default()
    }

    pub fn last_update_millis(&self) -> i64 {
        self.last_update_millis.load(Ordering::Acquire)
    }

    fn touch(&self) {
        self.last_update_millis
            .fetch_max(Utc::now().timestamp_millis(), Ordering::AcqRel);
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_file())
}
