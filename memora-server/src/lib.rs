//! HTTP front end for the Memora media server.
//!
//! Routes:
//! - `GET /api/memories`: the media index, newest first
//! - `GET /api/media-status`: `{ "lastUpdate": <epoch millis> }`
//! - `GET /api/thumbnail/{id}`: cached JPEG thumbnail or 404
//! - `GET /media/{*path}`: the original file, with `Range` support
//! - `GET /ping`: liveness

pub mod handlers;
pub mod infra;
pub mod routes;
pub mod stream;

pub use infra::app_state::AppState;
pub use routes::create_app;
