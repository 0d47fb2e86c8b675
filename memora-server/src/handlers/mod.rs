//! HTTP request handlers organized by functionality

pub mod media;

pub use media::{list_memories_handler, media_status_handler, thumbnail_handler};
