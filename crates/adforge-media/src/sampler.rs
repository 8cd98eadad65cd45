//! Deterministic frame sampling.

use std::sync::Arc;
use tracing::debug;

use adforge_models::{SampledFrame, Thumbnail};

use crate::decoder::MediaDecoder;
use crate::error::{MediaError, MediaResult};
use crate::thumbnail::{thumbnail_timestamp, THUMBNAIL_SCALE_WIDTH};

/// Upper bound on frames per asset.
pub const DEFAULT_MAX_FRAMES: usize = 32;

/// Evidence extracted from one video.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub duration_secs: f64,
    pub frames: Vec<SampledFrame>,
    pub thumbnail: Thumbnail,
}

/// Timestamps `i * duration / k` for `i` in `0..k`.
pub fn sample_timestamps(duration: f64, k: usize) -> Vec<f64> {
    (0..k).map(|i| i as f64 * duration / k as f64).collect()
}

/// Extracts `k` evenly spaced frames plus a thumbnail.
///
/// Sampling is deterministic: identical bytes and `k` always request the same
/// timestamps. There is no retry; a decode failure is final for the asset.
#[derive(Clone)]
pub struct FrameSampler {
    decoder: Arc<dyn MediaDecoder>,
    max_frames: usize,
}

impl FrameSampler {
    pub fn new(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self {
            decoder,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub async fn sample(&self, video: &[u8], k: usize) -> MediaResult<SampleSet> {
        if k == 0 || k > self.max_frames {
            return Err(MediaError::SampleOutOfRange {
                requested: k,
                max: self.max_frames,
            });
        }

        let duration = self.decoder.probe_duration(video).await?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MediaError::ZeroDuration);
        }

        let timestamps = sample_timestamps(duration, k);
        let images = self.decoder.extract_frames(video, &timestamps, None).await?;
        if images.len() != timestamps.len() {
            return Err(MediaError::decode_failed(format!(
                "decoder returned {} frames, expected {}",
                images.len(),
                timestamps.len()
            )));
        }

        let frames = timestamps
            .into_iter()
            .zip(images)
            .map(|(at, data)| SampledFrame::jpeg(at, data))
            .collect();

        let thumbnail = self
            .decoder
            .extract_frames(
                video,
                &[thumbnail_timestamp(duration)],
                Some(THUMBNAIL_SCALE_WIDTH),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::decode_failed("decoder returned no thumbnail"))?;

        debug!(duration, frames = k, "Sampled video");

        Ok(SampleSet {
            duration_secs: duration,
            frames,
            thumbnail: Thumbnail {
                mime_type: "image/jpeg".to_string(),
                width: THUMBNAIL_SCALE_WIDTH,
                data: thumbnail,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Decoder whose "video" bytes are the duration as ASCII text.
    #[derive(Default)]
    struct TextDecoder {
        extract_calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaDecoder for TextDecoder {
        async fn probe_duration(&self, video: &[u8]) -> MediaResult<f64> {
            std::str::from_utf8(video)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| MediaError::UnsupportedCodec("not a video".into()))
        }

        async fn extract_frames(
            &self,
            _video: &[u8],
            timestamps: &[f64],
            _scale_width: Option<u32>,
        ) -> MediaResult<Vec<Vec<u8>>> {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            Ok(timestamps.iter().map(|t| t.to_string().into_bytes()).collect())
        }
    }

    fn sampler() -> (FrameSampler, Arc<TextDecoder>) {
        let decoder = Arc::new(TextDecoder::default());
        (FrameSampler::new(decoder.clone()), decoder)
    }

    #[test]
    fn test_sample_timestamps_formula() {
        assert_eq!(sample_timestamps(10.0, 4), vec![0.0, 2.5, 5.0, 7.5]);
        assert_eq!(sample_timestamps(3.0, 1), vec![0.0]);
    }

    #[tokio::test]
    async fn test_exactly_k_increasing_frames_within_duration() {
        let (sampler, _) = sampler();
        for duration in [0.4_f64, 1.0, 10.0, 93.7] {
            for k in 1..=sampler.max_frames() {
                let set = sampler
                    .sample(duration.to_string().as_bytes(), k)
                    .await
                    .unwrap();
                assert_eq!(set.frames.len(), k);
                assert_eq!(set.frames[0].timestamp_secs, 0.0);
                for pair in set.frames.windows(2) {
                    assert!(pair[0].timestamp_secs < pair[1].timestamp_secs);
                }
                assert!(set.frames.iter().all(|f| f.timestamp_secs < duration));
            }
        }
    }

    #[tokio::test]
    async fn test_sampling_is_deterministic() {
        let (sampler, _) = sampler();
        let a = sampler.sample(b"10", 8).await.unwrap();
        let b = sampler.sample(b"10", 8).await.unwrap();
        assert_eq!(a.frames, b.frames);
        assert_eq!(a.thumbnail, b.thumbnail);
        assert_eq!(a.thumbnail.width, THUMBNAIL_SCALE_WIDTH);
    }

    #[tokio::test]
    async fn test_out_of_range_k_skips_decoding() {
        let (sampler, decoder) = sampler();
        let zero = sampler.sample(b"10", 0).await.unwrap_err();
        assert!(matches!(zero, MediaError::SampleOutOfRange { requested: 0, .. }));
        let too_many = sampler.sample(b"10", DEFAULT_MAX_FRAMES + 1).await.unwrap_err();
        assert!(matches!(too_many, MediaError::SampleOutOfRange { .. }));
        assert_eq!(decoder.extract_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_is_decode_error() {
        let (sampler, _) = sampler();
        let err = sampler.sample(b"0", 8).await.unwrap_err();
        assert!(matches!(err, MediaError::ZeroDuration));
        assert!(err.is_decode_error());
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let (sampler, _) = sampler();
        let err = sampler.sample(b"\x00\x01garbage", 8).await.unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedCodec(_)));
    }
}
