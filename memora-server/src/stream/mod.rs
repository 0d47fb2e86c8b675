//! Range-aware streaming of original media files.

pub mod range;
pub mod stream_handlers;

pub use range::{ByteRange, RangeRequest, parse_range_header};
pub use stream_handlers::{content_type_for, media_handler, serve};
