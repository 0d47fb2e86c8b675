//! # Memora Core
//!
//! Core library for the Memora media server: the in-memory media index,
//! the filesystem watcher that keeps it current, and the on-disk thumbnail
//! cache with its background generation queue.
//!
//! ## Architecture
//!
//! - [`media`]: media kinds, extension classification and the [`MediaItem`] record
//! - [`identity`]: stable [`MediaId`]s derived from root-relative paths
//! - [`paths`]: URL building and traversal-safe path resolution
//! - [`index`]: the [`MediaIndex`] and its change timestamp
//! - [`fs_watch`]: stability-gated watching of the media root
//! - [`thumbnails`]: JPEG thumbnail generation, caching and queueing
//!
//! ## Examples
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//! use memora_core::{
//!     fs_watch::{MediaWatcher, WatchConfig, prepare_root},
//!     index::MediaIndex,
//!     thumbnails::{ThumbnailCache, ThumbnailQueue, ThumbnailQueueConfig, ThumbnailSettings},
//! };
//!
//! # async fn example() -> memora_core::Result<()> {
//! let root = prepare_root(Path::new("./media")).await?;
//! let cache = Arc::new(ThumbnailCache::new("./thumbnails", ThumbnailSettings::default(), None));
//! cache.ensure_dir().await?;
//! let (queue, _dispatcher) = ThumbnailQueue::spawn(cache, ThumbnailQueueConfig::default());
//!
//! let index = Arc::new(MediaIndex::new(root, Arc::new(queue)));
//! let _watcher = MediaWatcher::start(Arc::clone(&index), WatchConfig::default()).await;
//!
//! for item in index.list() {
//!     println!("{} ({})", item.relative_path, item.kind);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fs_watch;
pub mod identity;
pub mod index;
pub mod media;
pub mod paths;
pub mod thumbnails;

pub use error::{MediaError, Result};
pub use identity::{MediaId, identify};
pub use index::MediaIndex;
pub use media::{MediaItem, MediaKind};
