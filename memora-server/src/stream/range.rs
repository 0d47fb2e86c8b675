//! `Range: bytes=...` interpretation for single-resource responses.

/// Inclusive byte span within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// How a request's `Range` header should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable header: send the whole resource with 200.
    Full,
    /// Send exactly this slice with 206.
    Partial(ByteRange),
    /// Well formed but outside the resource: 416.
    Unsatisfiable,
}

/// Interpret a `Range` header value against a resource of `size` bytes.
///
/// Only the first range of a multi-range header is honored. Headers that
/// don't parse are ignored. End offsets are never clamped: `bytes=900-1200`
/// on a 1000 byte file is unsatisfiable.
pub fn parse_range_header(value: &str, size: u64) -> RangeRequest {
    let Some((unit, ranges)) = value.trim().split_once('=') else {
        return RangeRequest::Full;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return RangeRequest::Full;
    }

    let first = ranges.split(',').next().unwrap_or_default().trim();
    let Some((start, end)) = first.split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix form: the last N bytes.
        let Ok(suffix) = end.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if end.is_empty() {
        match size.checked_sub(1) {
            Some(last) => last,
            None => return RangeRequest::Unsatisfiable,
        }
    } else {
        match end.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return RangeRequest::Full,
        }
    };

    if start > end || end >= size {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Partial(ByteRange { start, end })
}
