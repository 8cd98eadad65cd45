//! Error types for media operations.

use adforge_models::FailureCategory;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while sampling a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Video has zero duration")]
    ZeroDuration,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Sample count {requested} out of range (1..={max})")]
    SampleOutOfRange { requested: usize, max: usize },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    /// Everything except a bad sample count means the bytes could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, MediaError::SampleOutOfRange { .. })
    }

    /// Failure category recorded on the asset.
    pub fn failure_category(&self) -> FailureCategory {
        if self.is_decode_error() {
            FailureCategory::Decode
        } else {
            FailureCategory::SampleOutOfRange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_category() {
        assert_eq!(MediaError::ZeroDuration.failure_category(), FailureCategory::Decode);
        assert_eq!(
            MediaError::UnsupportedCodec("prores".into()).failure_category(),
            FailureCategory::Decode
        );
        let out_of_range = MediaError::SampleOutOfRange { requested: 0, max: 32 };
        assert!(!out_of_range.is_decode_error());
        assert_eq!(out_of_range.failure_category(), FailureCategory::SampleOutOfRange);
    }
}
