//! Media decoder seam.
//!
//! The pipeline never decodes video itself; it goes through [`MediaDecoder`].
//! [`FfmpegDecoder`] is the production implementation.

use async_trait::async_trait;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Decodes raw video bytes into still images.
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// Duration of the video in seconds.
    async fn probe_duration(&self, video: &[u8]) -> MediaResult<f64>;

    /// One encoded image per requested timestamp, in request order.
    ///
    /// `scale_width` resizes the output keeping aspect ratio.
    async fn extract_frames(
        &self,
        video: &[u8],
        timestamps: &[f64],
        scale_width: Option<u32>,
    ) -> MediaResult<Vec<Vec<u8>>>;
}

/// Decoder backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    runner: FfmpegRunner,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    /// The CLI tools read from a path, so the bytes are spilled to a temp file
    /// that lives as long as the returned handle.
    async fn spill(video: &[u8]) -> MediaResult<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix("adforge-")
            .suffix(".video")
            .tempfile()?;
        tokio::fs::write(file.path(), video).await?;
        Ok(file)
    }
}

#[async_trait]
impl MediaDecoder for FfmpegDecoder {
    async fn probe_duration(&self, video: &[u8]) -> MediaResult<f64> {
        let file = Self::spill(video).await?;
        let info = probe_video(file.path()).await.map_err(|e| match e {
            MediaError::FfprobeFailed { message, stderr } => MediaError::decode_failed(format!(
                "{}: {}",
                message,
                stderr.unwrap_or_default().trim()
            )),
            other => other,
        })?;
        debug!(codec = %info.codec, duration = info.duration, "Probed video");
        Ok(info.duration)
    }

    async fn extract_frames(
        &self,
        video: &[u8],
        timestamps: &[f64],
        scale_width: Option<u32>,
    ) -> MediaResult<Vec<Vec<u8>>> {
        let file = Self::spill(video).await?;
        let mut frames = Vec::with_capacity(timestamps.len());

        for &at in timestamps {
            let mut cmd = FfmpegCommand::new(file.path()).seek(at).single_frame();
            if let Some(width) = scale_width {
                cmd = cmd.scale_width(width);
            }
            let cmd = cmd.jpeg_to_stdout();

            let image = self.runner.run_capture(&cmd).await.map_err(|e| match e {
                MediaError::FfmpegFailed { stderr, .. } => MediaError::decode_failed(format!(
                    "frame at {:.3}s: {}",
                    at,
                    stderr.unwrap_or_default().trim()
                )),
                other => other,
            })?;

            if image.is_empty() {
                return Err(MediaError::decode_failed(format!(
                    "no frame decoded at {:.3}s",
                    at
                )));
            }
            frames.push(image);
        }

        Ok(frames)
    }
}
