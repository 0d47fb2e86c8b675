pub mod item;
pub mod kind;

pub use item::MediaItem;
pub use kind::{MediaKind, classify, classify_path};
