use std::{fmt, sync::Arc};

use dashmap::DashSet;
use tokio::{
    sync::{Semaphore, mpsc, mpsc::error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{ThumbnailJob, ThumbnailSink, cache::ThumbnailCache};
use crate::identity::MediaId;

/// Sizing for the thumbnail worker pool.
#[derive(Clone, Debug)]
pub struct ThumbnailQueueConfig {
    /// Jobs buffered in front of the workers. Requests beyond this wait in
    /// a backlog that holds at most one job per distinct id.
    pub capacity: usize,
    /// Generations allowed to run at once.
    pub workers: usize,
}

impl Default for ThumbnailQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            workers: 2,
        }
    }
}

/// Bounded, id-deduplicating queue in front of a [`ThumbnailCache`].
///
/// An id stays in the in-flight set from submission until its generation
/// attempt finishes, so concurrent requests for one id collapse into a
/// single attempt. Completed work is remembered only by the file on disk.
///
/// When the bounded channel is full, jobs move to a backlog drained by a
/// single forwarding task. The in-flight set caps the backlog at one entry
/// per id, so it never grows past the number of indexed files.
#[derive(Clone)]
pub struct ThumbnailQueue {
    tx: mpsc::Sender<ThumbnailJob>,
    backlog: mpsc::UnboundedSender<ThumbnailJob>,
    in_flight: Arc<DashSet<MediaId>>,
    cache: Arc<ThumbnailCache>,
}

impl fmt::Debug for ThumbnailQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailQueue")
            .field("in_flight", &self.in_flight.len())
            .field("capacity", &self.tx.max_capacity())
            .field("cache", &self.cache)
            .finish()
    }
}

impl ThumbnailQueue {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn spawn(cache: Arc<ThumbnailCache>, config: ThumbnailQueueConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (backlog, backlog_rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(DashSet::new());

        spawn_backlog_forwarder(backlog_rx, tx.clone(), Arc::clone(&in_flight));
        let handle = spawn_dispatcher(
            rx,
            Arc::clone(&cache),
            Arc::clone(&in_flight),
            config.workers.max(1),
        );

        (
            Self {
                tx,
                backlog,
                in_flight,
                cache,
            },
            handle,
        )
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// Ids submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: &MediaId) -> bool {
        self.in_flight.contains(id)
    }
}

impl ThumbnailSink for ThumbnailQueue {
    fn request(&self, job: ThumbnailJob) {
        if !job.kind.has_thumbnail() {
            return;
        }
        if self.cache.path_for(&job.id).exists() {
            return;
        }
        if !self.in_flight.insert(job.id.clone()) {
            debug!(id = %job.id, "Thumbnail already queued");
            return;
        }

        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                debug!(id = %job.id, "Thumbnail queue full, deferring to backlog");
                if let Err(err) = self.backlog.send(job) {
                    warn!(id = %err.0.id, "Thumbnail backlog closed, dropping request");
                    self.in_flight.remove(&err.0.id);
                }
            }
            Err(TrySendError::Closed(job)) => {
                warn!(id = %job.id, "Thumbnail queue closed, dropping request");
                self.in_flight.remove(&job.id);
            }
        }
    }
}

fn spawn_backlog_forwarder(
    mut backlog: mpsc::UnboundedReceiver<ThumbnailJob>,
    tx: mpsc::Sender<ThumbnailJob>,
    in_flight: Arc<DashSet<MediaId>>,
) {
    tokio::spawn(async move {
        while let Some(job) = backlog.recv().await {
            if let Err(err) = tx.send(job).await {
                in_flight.remove(&err.0.id);
            }
        }
    });
}

fn spawn_dispatcher(
    mut rx: mpsc::Receiver<ThumbnailJob>,
    cache: Arc<ThumbnailCache>,
    in_flight: Arc<DashSet<MediaId>>,
    workers: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let permits = Arc::new(Semaphore::new(workers));

        while let Some(job) = rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let cache = Arc::clone(&cache);
            let in_flight = Arc::clone(&in_flight);

            tokio::spawn(async move {
                cache.ensure_thumbnail(&job.source, &job.id, job.kind).await;
                in_flight.remove(&job.id);
                drop(permit);
            });
        }
        debug!("Thumbnail dispatcher stopped");
    })
}
