use std::{path::Path, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, Result};

/// Pulls a single still frame out of a video file.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Return an encoded image (any format the `image` crate decodes) of
    /// the frame at `seek_fraction` of the video's duration.
    async fn extract_frame(&self, source: &Path, seek_fraction: f64) -> Result<Vec<u8>>;
}

/// Frame extraction through the `ffmpeg` / `ffprobe` binaries.
///
/// Every invocation runs under `timeout` and the child is killed if the
/// future is dropped, so a wedged decoder can't pin a worker forever.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    /// Probe the configured binary; `None` if it can't be executed.
    pub async fn detect(
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
        timeout: Duration,
    ) -> Option<Self> {
        let extractor = Self::new(ffmpeg_path, ffprobe_path, timeout);
        let mut cmd = Command::new(&extractor.ffmpeg_path);
        cmd.arg("-version");
        match extractor.run(cmd).await {
            Ok(output) => {
                let banner = String::from_utf8_lossy(&output);
                info!(
                    version = banner.lines().next().unwrap_or_default(),
                    "ffmpeg available for video thumbnails"
                );
                Some(extractor)
            }
            Err(err) => {
                debug!(path = %extractor.ffmpeg_path, error = %err, "ffmpeg probe failed");
                None
            }
        }
    }

    /// Container duration in seconds, if ffprobe can tell.
    async fn probe_duration(&self, source: &Path) -> Option<f64> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(source);

        match self.run(cmd).await {
            Ok(stdout) => String::from_utf8_lossy(&stdout)
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs > 0.0),
            Err(err) => {
                debug!(source = %source.display(), error = %err, "ffprobe failed");
                None
            }
        }
    }

    async fn grab_frame(&self, source: &Path, offset_secs: f64) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{offset_secs:.3}"))
            .arg("-i")
            .arg(source)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"]);
        self.run(cmd).await
    }

    async fn run(&self, mut cmd: Command) -> Result<Vec<u8>> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| MediaError::Generation(format!("timed out after {:?}", self.timeout)))?
            .map_err(|err| MediaError::Generation(format!("failed to spawn: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Generation(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, source: &Path, seek_fraction: f64) -> Result<Vec<u8>> {
        let offset = match self.probe_duration(source).await {
            Some(duration) => duration * seek_fraction.clamp(0.0, 1.0),
            None => 0.0,
        };

        let frame = self.grab_frame(source, offset).await?;
        if !frame.is_empty() {
            return Ok(frame);
        }

        // Seeking past the last keyframe yields no output; retry from the start.
        if offset > 0.0 {
            let frame = self.grab_frame(source, 0.0).await?;
            if !frame.is_empty() {
                return Ok(frame);
            }
        }
        Err(MediaError::Generation(format!(
            "no frame decoded from {}",
            source.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_not_detected() {
        let detected = FfmpegFrameExtractor::detect(
            "/nonexistent/ffmpeg-for-memora-tests",
            "/nonexistent/ffprobe-for-memora-tests",
            Duration::from_secs(2),
        )
        .await;
        assert!(detected.is_none());
    }

    #[tokio::test]
    async fn extraction_through_a_missing_binary_fails_cleanly() {
        let extractor = FfmpegFrameExtractor::new(
            "/nonexistent/ffmpeg-for-memora-tests",
            "/nonexistent/ffprobe-for-memora-tests",
            Duration::from_secs(2),
        );
        let err = extractor
            .extract_frame(Path::new("clip.mp4"), 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Generation(_)));
    }
}
