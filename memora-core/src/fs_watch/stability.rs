//! Write-settling: a path is only reported once its size and mtime have
//! stopped changing for a full window.

use std::{
    collections::HashMap,
    fs::Metadata,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

/// What we compare between polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileSnapshot {
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[derive(Debug)]
struct Pending {
    last: Option<FileSnapshot>,
    unchanged_since: Instant,
}

/// Result of one [`StabilityTracker::poll`] pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Settled {
    /// Unchanged for the whole window; safe to index.
    pub ready: Vec<PathBuf>,
    /// Disappeared (or stopped being a file) while pending.
    pub vanished: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct StabilityTracker {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl StabilityTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Start (or restart) the settling clock for `path`.
    pub fn observe(&mut self, path: PathBuf, now: Instant) {
        self.pending
            .entry(path)
            .and_modify(|pending| pending.unchanged_since = now)
            .or_insert(Pending {
                last: None,
                unchanged_since: now,
            });
    }

    pub fn forget(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Stop tracking everything at or beneath `dir`.
    pub fn forget_under(&mut self, dir: &Path) {
        self.pending.retain(|path, _| !path.starts_with(dir));
    }

    /// Paths currently settling.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.pending.keys().cloned().collect()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Re-stat every pending path and hand back the ones that settled.
    ///
    /// `stat` returns `None` when the path is missing or not a regular file.
    pub fn poll<F>(&mut self, now: Instant, mut stat: F) -> Settled
    where
        F: FnMut(&Path) -> Option<FileSnapshot>,
    {
        let mut settled = Settled::default();

        self.pending.retain(|path, pending| {
            let Some(current) = stat(path) else {
                settled.vanished.push(path.clone());
                return false;
            };

            if pending.last != Some(current) {
                pending.last = Some(current);
                pending.unchanged_since = now;
                return true;
            }

            if now.duration_since(pending.unchanged_since) >= self.window {
                settled.ready.push(path.clone());
                return false;
            }
            true
        });

        settled.ready.sort();
        settled.vanished.sort();
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(2);

    fn snap(size: u64) -> Option<FileSnapshot> {
        Some(FileSnapshot {
            size,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(size)),
        })
    }

    #[test]
    fn reports_only_after_a_full_quiet_window() {
        let start = Instant::now();
        let path = PathBuf::from("/media/a.jpg");
        let mut tracker = StabilityTracker::new(WINDOW);
        tracker.observe(path.clone(), start);

        assert!(tracker.poll(start, |_| snap(10)).ready.is_empty());
        assert!(tracker.poll(start + Duration::from_secs(1), |_| snap(10)).ready.is_empty());

        let settled = tracker.poll(start + Duration::from_secs(2), |_| snap(10));
        assert_eq!(settled.ready, vec![path]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn growth_restarts_the_window() {
        let start = Instant::now();
        let path = PathBuf::from("/media/big.mp4");
        let mut tracker = StabilityTracker::new(WINDOW);
        tracker.observe(path.clone(), start);

        tracker.poll(start, |_| snap(100));
        tracker.poll(start + Duration::from_millis(1900), |_| snap(200));
        assert!(
            tracker
                .poll(start + Duration::from_millis(3000), |_| snap(200))
                .ready
                .is_empty()
        );
        assert_eq!(
            tracker.poll(start + Duration::from_millis(3900), |_| snap(200)).ready,
            vec![path]
        );
    }

    #[test]
    fn fresh_events_restart_the_window() {
        let start = Instant::now();
        let path = PathBuf::from("/media/a.png");
        let mut tracker = StabilityTracker::new(WINDOW);
        tracker.observe(path.clone(), start);
        tracker.poll(start, |_| snap(1));

        tracker.observe(path.clone(), start + Duration::from_millis(1500));
        assert!(tracker.poll(start + Duration::from_millis(2500), |_| snap(1)).ready.is_empty());
        assert_eq!(
            tracker.poll(start + Duration::from_millis(3500), |_| snap(1)).ready,
            vec![path]
        );
    }

    #[test]
    fn vanished_files_are_reported_and_dropped() {
        let start = Instant::now();
        let path = PathBuf::from("/media/tmp.mov");
        let mut tracker = StabilityTracker::new(WINDOW);
        tracker.observe(path.clone(), start);

        let settled = tracker.poll(start, |_| None);
        assert_eq!(settled.vanished, vec![path]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn forget_under_clears_a_directory() {
        let now = Instant::now();
        let mut tracker = StabilityTracker::new(WINDOW);
        tracker.observe(PathBuf::from("/media/trip/a.jpg"), now);
        tracker.observe(PathBuf::from("/media/trip/b/c.jpg"), now);
        tracker.observe(PathBuf::from("/media/tripod.jpg"), now);

        tracker.forget_under(Path::new("/media/trip"));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_pending(Path::new("/media/tripod.jpg")));
    }
}
