//! Root-containment policy shared by the index and the stream responder.
//!
//! Relative paths are always rendered with `/` separators regardless of
//! platform so index keys, ids and URLs agree everywhere.

use std::path::{Component, Path, PathBuf};

use crate::error::{MediaError, Result};

/// URL prefix under which original files are streamed.
pub const MEDIA_URL_PREFIX: &str = "/media";
/// URL prefix under which cached thumbnails are served.
pub const THUMBNAIL_URL_PREFIX: &str = "/api/thumbnail";

/// Express `path` relative to `root` as a `/`-joined key.
///
/// Returns `None` when `path` is outside `root`, equals `root`, or contains
/// anything other than plain name components after the root.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(seg) => segments.push(seg.to_str()?.to_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// True when any component below `root` starts with a dot.
pub fn is_hidden(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|component| match component {
        Component::Normal(seg) => seg.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Percent-encode each segment of a relative key, preserving separators.
pub fn encode_segments(relative: &str) -> String {
    relative
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Separators accepted in request paths. A backslash is an ordinary name
/// character on Unix.
#[cfg(windows)]
const REQUEST_SEPARATORS: &[char] = &['/', '\\'];
#[cfg(not(windows))]
const REQUEST_SEPARATORS: &[char] = &['/'];

pub fn media_url(relative: &str) -> String {
    format!("{MEDIA_URL_PREFIX}/{}", encode_segments(relative))
}

/// Lexically resolve an already percent-decoded request path against `root`.
///
/// `..` segments are allowed only while they stay inside the root; absolute
/// paths and drive prefixes are rejected outright.
pub fn resolve_within_root(root: &Path, requested: &str) -> Result<PathBuf> {
    if requested.trim().is_empty() {
        return Err(MediaError::InvalidPath("empty path".into()));
    }
    if requested.contains('\0') {
        return Err(MediaError::InvalidPath("path contains NUL".into()));
    }
    if Path::new(requested).has_root() {
        return Err(MediaError::PathEscape(requested.to_string()));
    }

    let mut clean = PathBuf::new();
    for segment in requested.split(REQUEST_SEPARATORS) {
        match segment {
            "" | "." => {}
            ".." => {
                if !clean.pop() {
                    return Err(MediaError::PathEscape(requested.to_string()));
                }
            }
            other => {
                let mut components = Path::new(other).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => clean.push(other),
                    _ => return Err(MediaError::PathEscape(requested.to_string())),
                }
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(MediaError::InvalidPath(requested.to_string()));
    }
    Ok(root.join(clean))
}

/// Resolve `requested` and confirm it names an existing file inside `root`,
/// following symlinks. Returns the canonical file path.
pub async fn resolve_existing_file(root: &Path, requested: &str) -> Result<PathBuf> {
    let candidate = resolve_within_root(root, requested)?;

    let canonical = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::NotFound(requested.to_string()));
        }
        Err(err) => return Err(MediaError::Io(err)),
    };
    let canonical_root = tokio::fs::canonicalize(root).await?;
    if !canonical.starts_with(&canonical_root) {
        return Err(MediaError::PathEscape(requested.to_string()));
    }

    let metadata = tokio::fs::metadata(&canonical).await?;
    if !metadata.is_file() {
        return Err(MediaError::NotFound(requested.to_string()));
    }
    Ok(canonical)
}
