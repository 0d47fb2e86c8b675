pub mod handle_memories;
pub mod handle_thumbnail;

pub use handle_memories::{MediaStatus, list_memories_handler, media_status_handler};
pub use handle_thumbnail::thumbnail_handler;
