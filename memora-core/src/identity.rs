//! Stable identifiers for indexed media.
//!
//! An id is derived from the file's path relative to the media root and
//! nothing else, so the same relative path maps to the same id across
//! restarts. The id also names the thumbnail cache slot.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MediaError, Result};

/// Number of digest bytes kept in an id (rendered as twice as many hex chars).
const ID_BYTES: usize = 8;

/// Short, path-derived media identifier.
///
/// Collisions are not detected; with 64 bits they are vanishingly rare for
/// any realistic library but remain possible.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Validate an id received from the outside (e.g. a URL segment).
    ///
    /// Only the exact shape produced by [`identify`] is accepted, which also
    /// keeps ids safe to join onto the cache directory.
    pub fn parse(raw: &str) -> Result<Self> {
        let well_formed = raw.len() == ID_BYTES * 2
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(MediaError::InvalidPath(format!("malformed media id '{raw}'")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a root-relative path to its id. Total and deterministic.
pub fn identify(relative_path: &str) -> MediaId {
    let digest = Sha256::digest(relative_path.as_bytes());
    MediaId(hex::encode(&digest[..ID_BYTES]))
}
