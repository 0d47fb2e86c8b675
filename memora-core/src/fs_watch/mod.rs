//! Filesystem watch pipeline feeding the [`MediaIndex`].
//!
//! A thin wrapper around `notify`: raw notifications are pushed onto a
//! channel, paths that changed wait in a [`StabilityTracker`] until their
//! writes settle, and settled paths go through one `reconcile` step that
//! serves both creation and modification. Removals apply immediately.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, spawn_blocking},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{MediaError, Result},
    index::MediaIndex,
    media::classify_path,
    paths::is_hidden,
};

mod stability;

pub use stability::{FileSnapshot, Settled, StabilityTracker};

/// Configuration knobs for watch processing.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// How long size and mtime must hold still before a file is indexed.
    pub stability_window: Duration,
    /// How often pending files are re-checked.
    pub poll_interval: Duration,
    /// Raw notification buffer between the notify thread and the loop.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            stability_window: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(100),
            channel_capacity: 4096,
        }
    }
}

/// Create the media root if needed and return its canonical form.
///
/// Canonicalizing up front keeps notify's reported paths, the index keys
/// and the hidden-file check all relative to the same prefix.
pub async fn prepare_root(root: &Path) -> Result<PathBuf> {
    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        tokio::fs::create_dir_all(root).await.map_err(|err| {
            MediaError::WatchSetup(format!("failed to create media root {}: {err}", root.display()))
        })?;
        info!(root = %root.display(), "Created media root directory");
    }
    tokio::fs::canonicalize(root).await.map_err(|err| {
        MediaError::WatchSetup(format!("media root {} is inaccessible: {err}", root.display()))
    })
}

/// Running watcher for one media root. Dropping it stops watching.
pub struct MediaWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for MediaWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaWatcher")
            .field("root", &self.root)
            .field("notify_active", &self.watcher.is_some())
            .field("loop_running", &self.task.as_ref().map(|task| !task.is_finished()))
            .finish()
    }
}

impl MediaWatcher {
    /// Start watching `index.root()`, seeding the index from what is already
    /// on disk.
    ///
    /// Never fails: if the root can't be prepared the error is logged and an
    /// inert watcher is returned, leaving the index empty.
    pub async fn start(index: Arc<MediaIndex>, config: WatchConfig) -> Self {
        let root = index.root().to_path_buf();

        if let Err(err) = prepare_root(&root).await {
            error!(root = %root.display(), error = %err, "Media watch disabled");
            return Self {
                root,
                watcher: None,
                task: None,
            };
        }

        let (tx, rx) = mpsc::channel::<WatchMessage>(config.channel_capacity.max(1));

        let watcher_root = root.clone();
        let watcher = match spawn_blocking(move || init_watcher(&watcher_root, tx)).await {
            Ok(Ok(watcher)) => {
                info!(root = %root.display(), "Watching for media");
                Some(watcher)
            }
            Ok(Err(err)) => {
                error!(root = %root.display(), error = %err, "Live watching unavailable");
                None
            }
            Err(join_err) => {
                error!(error = %join_err, "Watcher initialization panicked");
                None
            }
        };

        let task = spawn_watch_loop(index, rx, config);

        Self {
            root,
            watcher,
            task: Some(task),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether live notifications are flowing.
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.watcher.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MediaWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => f
                .debug_struct("WatchMessage::Event")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
        }
    }
}

fn init_watcher(root: &Path, tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    let root_for_log = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            let message = match res {
                Ok(event) => WatchMessage::Event(event),
                Err(err) => WatchMessage::Error(err.to_string()),
            };
            if let Err(err) = tx.blocking_send(message) {
                warn!(root = %root_for_log.display(), "fs_watch channel send failed: {err}");
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| MediaError::WatchSetup(format!("failed to create watcher: {err}")))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| MediaError::WatchSetup(format!("failed to watch {}: {err}", root.display())))?;

    Ok(watcher)
}

fn spawn_watch_loop(
    index: Arc<MediaIndex>,
    mut rx: mpsc::Receiver<WatchMessage>,
    config: WatchConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = WatchState {
            tracker: StabilityTracker::new(config.stability_window),
            index,
        };
        state.rescan().await;

        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(WatchMessage::Event(event)) => state.handle_event(event).await,
                    Some(WatchMessage::Error(message)) => {
                        warn!(error = %message, "Watcher reported an error, rescanning");
                        state.rescan().await;
                    }
                    None => break,
                },
                _ = ticker.tick(), if !state.tracker.is_empty() => state.settle().await,
            }
        }
        debug!("Watch loop stopped");
    })
}

struct WatchState {
    tracker: StabilityTracker,
    index: Arc<MediaIndex>,
}

impl WatchState {
    async fn handle_event(&mut self, event: Event) {
        if event.need_rescan() {
            warn!("Watcher overflowed, rescanning media root");
            self.rescan().await;
            return;
        }

        match event.kind {
            EventKind::Access(_) => {}
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Metadata(_)) => {
                for path in event.paths {
                    self.note_change(path).await;
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
                for path in event.paths {
                    self.note_removal(&path);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in event.paths {
                    self.note_change(path).await;
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                if let Some(from) = paths.next() {
                    self.note_removal(&from);
                }
                if let Some(to) = paths.next() {
                    self.note_change(to).await;
                }
            }
            // Ambiguous kinds: let the filesystem say what happened.
            _ => {
                for path in event.paths {
                    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                        self.note_change(path).await;
                    } else {
                        self.note_removal(&path);
                    }
                }
            }
        }
    }

    /// Something was created or written at `path`; start settling it.
    /// Symlinks are skipped, as in the directory walk.
    async fn note_change(&mut self, path: PathBuf) {
        let root = self.index.root();
        if !path.starts_with(root) || is_hidden(root, &path) {
            return;
        }

        match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => {
                let now = Instant::now();
                for file in walk_media_files(root.to_path_buf(), path).await {
                    self.tracker.observe(file, now);
                }
            }
            Ok(metadata) if metadata.is_file() => {
                if classify_path(&path).is_some() {
                    self.tracker.observe(path, Instant::now());
                }
            }
            Ok(_) => {}
            // Gone again before we looked.
            Err(_) => self.note_removal(&path),
        }
    }

    fn note_removal(&mut self, path: &Path) {
        self.tracker.forget(path);
        self.tracker.forget_under(path);
        if self.index.remove(path).is_none() {
            self.index.remove_under(path);
        }
    }

    /// Hand every settled path to `reconcile`.
    async fn settle(&mut self) {
        let snapshots = snapshot_files(self.tracker.paths()).await;
        let settled = self
            .tracker
            .poll(Instant::now(), |path| snapshots.get(path).copied().flatten());
        if settled.ready.is_empty() && settled.vanished.is_empty() {
            return;
        }

        let index = Arc::clone(&self.index);
        let applied = spawn_blocking(move || {
            for path in settled.vanished {
                index.remove(&path);
            }
            for path in settled.ready {
                reconcile(&index, &path);
            }
        })
        .await;
        if let Err(err) = applied {
            warn!(error = %err, "Reconcile task panicked");
        }
    }

    /// Re-walk the whole root and drop entries whose files disappeared.
    async fn rescan(&mut self) {
        let root = self.index.root().to_path_buf();
        let files = walk_media_files(root.clone(), root).await;
        let now = Instant::now();
        let found = files.len();
        for file in files {
            self.tracker.observe(file, now);
        }
        let index = Arc::clone(&self.index);
        let pruned = spawn_blocking(move || index.prune_missing())
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "Prune task panicked");
                0
            });
        debug!(found, pruned, "Media root scanned");
    }
}

/// The one place creation and modification converge: bring the index entry
/// for `path` in line with what is on disk now.
fn reconcile(index: &MediaIndex, path: &Path) {
    match index.upsert(path) {
        Ok(_) => {}
        Err(MediaError::NotFound(_)) => {
            index.remove(path);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Error processing file");
        }
    }
}

/// Stat `paths` off the runtime. `None` marks a path that is missing or not
/// a regular file.
async fn snapshot_files(paths: Vec<PathBuf>) -> HashMap<PathBuf, Option<FileSnapshot>> {
    let stats = spawn_blocking(move || {
        paths
            .into_iter()
            .map(|path| {
                let snapshot = std::fs::symlink_metadata(&path)
                    .ok()
                    .filter(|metadata| metadata.is_file())
                    .map(|metadata| FileSnapshot::of(&metadata));
                (path, snapshot)
            })
            .collect()
    })
    .await;

    stats.unwrap_or_else(|err| {
        warn!(error = %err, "Stat task panicked");
        HashMap::new()
    })
}

/// Media files under `dir`, skipping hidden entries and symlinks below `root`.
async fn walk_media_files(root: PathBuf, dir: PathBuf) -> Vec<PathBuf> {
    let walked = spawn_blocking(move || {
        WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_hidden(&root, entry.path()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| classify_path(path).is_some())
            .collect::<Vec<_>>()
    })
    .await;

    match walked {
        Ok(files) => files,
        Err(err) => {
            warn!(error = %err, "Directory walk panicked");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::thumbnails::NoopThumbnailSink;

    fn state_for(root: &Path) -> WatchState {
        WatchState {
            tracker: StabilityTracker::new(Duration::ZERO),
            index: Arc::new(MediaIndex::new(root, Arc::new(NoopThumbnailSink))),
        }
    }

    fn event(kind: EventKind, paths: &[PathBuf]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(path.clone());
        }
        event
    }

    /// Two polls: the first records a snapshot, the second sees it unchanged.
    async fn settle_fully(state: &mut WatchState) {
        state.settle().await;
        state.settle().await;
    }

    #[tokio::test]
    async fn create_then_settle_indexes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let photo = root.join("photo1.jpg");
        fs::write(&photo, b"jpeg").unwrap();

        let mut state = state_for(&root);
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::File), &[photo]))
            .await;
        assert!(state.index.is_empty(), "not indexed before settling");

        settle_fully(&mut state).await;
        assert!(state.index.get("photo1.jpg").is_some());
    }

    #[tokio::test]
    async fn modification_reuses_the_creation_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let clip = root.join("clip.mp4");
        fs::write(&clip, b"v1").unwrap();

        let mut state = state_for(&root);
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::File), &[clip.clone()]))
            .await;
        settle_fully(&mut state).await;

        fs::write(&clip, b"version two").unwrap();
        state
            .handle_event(event(
                EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
                &[clip],
            ))
            .await;
        settle_fully(&mut state).await;

        assert_eq!(state.index.len(), 1);
        assert_eq!(state.index.get("clip.mp4").unwrap().size_bytes, 11);
    }

    #[tokio::test]
    async fn removal_while_pending_never_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let photo = root.join("draft.png");
        fs::write(&photo, b"png").unwrap();

        let mut state = state_for(&root);
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::File), &[photo.clone()]))
            .await;
        state
            .handle_event(event(EventKind::Remove(notify::event::RemoveKind::File), &[photo]))
            .await;
        settle_fully(&mut state).await;

        assert!(state.index.is_empty());
        assert!(state.tracker.is_empty());
    }

    #[tokio::test]
    async fn ignores_hidden_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let notes = root.join("notes.txt");
        let hidden = root.join(".secret.jpg");
        fs::write(&notes, b"text").unwrap();
        fs::write(&hidden, b"jpeg").unwrap();

        let mut state = state_for(&root);
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::File), &[notes, hidden]))
            .await;

        assert!(state.tracker.is_empty());
    }

    #[tokio::test]
    async fn directory_arrival_indexes_its_files_but_not_itself() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let album = root.join("album");
        fs::create_dir_all(album.join("day1")).unwrap();
        fs::write(album.join("a.jpg"), b"x").unwrap();
        fs::write(album.join("day1/b.mov"), b"x").unwrap();

        let mut state = state_for(&root);
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::Folder), &[album]))
            .await;
        settle_fully(&mut state).await;

        let mut paths: Vec<String> = state
            .index
            .list()
            .into_iter()
            .map(|item| item.relative_path)
            .collect();
        paths.sort();
        assert_eq!(paths, ["album/a.jpg", "album/day1/b.mov"]);
    }

    #[tokio::test]
    async fn rename_moves_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let before = root.join("before.jpg");
        let after = root.join("after.jpg");
        fs::write(&before, b"x").unwrap();

        let mut state = state_for(&root);
        reconcile(&state.index, &before);
        fs::rename(&before, &after).unwrap();
        state
            .handle_event(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[before, after],
            ))
            .await;
        settle_fully(&mut state).await;

        assert!(state.index.get("before.jpg").is_none());
        assert!(state.index.get("after.jpg").is_some());
    }

    #[tokio::test]
    async fn removing_a_directory_drops_its_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let album = root.join("album");
        fs::create_dir(&album).unwrap();
        fs::write(album.join("a.jpg"), b"x").unwrap();

        let mut state = state_for(&root);
        reconcile(&state.index, &album.join("a.jpg"));
        fs::remove_dir_all(&album).unwrap();
        state
            .handle_event(event(EventKind::Remove(notify::event::RemoveKind::Folder), &[album]))
            .await;

        assert!(state.index.is_empty());
    }

    #[tokio::test]
    async fn rescan_picks_up_existing_files_and_prunes_stale_ones() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::write(root.join("keep.jpg"), b"x").unwrap();
        fs::write(root.join("stale.jpg"), b"x").unwrap();

        let mut state = state_for(&root);
        reconcile(&state.index, &root.join("stale.jpg"));
        fs::remove_file(root.join("stale.jpg")).unwrap();

        state.rescan().await;
        settle_fully(&mut state).await;

        assert!(state.index.get("stale.jpg").is_none());
        assert!(state.index.get("keep.jpg").is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_skipped_by_scan_and_live_events_alike() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let target = outside.path().join("real.jpg");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, root.join("early.jpg")).unwrap();

        let mut state = state_for(&root);
        state.rescan().await;
        settle_fully(&mut state).await;
        assert!(state.index.is_empty());

        let late = root.join("late.jpg");
        std::os::unix::fs::symlink(&target, &late).unwrap();
        state
            .handle_event(event(EventKind::Create(notify::event::CreateKind::File), &[late]))
            .await;
        settle_fully(&mut state).await;
        assert!(state.index.is_empty());
        assert!(state.tracker.is_empty());
    }

    #[tokio::test]
    async fn uncreatable_root_yields_an_inert_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let root = blocker.join("media");

        let index = Arc::new(MediaIndex::new(&root, Arc::new(NoopThumbnailSink)));
        let watcher = MediaWatcher::start(Arc::clone(&index), WatchConfig::default()).await;

        assert!(!watcher.is_active());
        assert!(index.is_empty());
    }
}
