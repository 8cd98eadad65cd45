//! Frame sampling for uploaded video assets.
//!
//! This crate provides:
//! - The `MediaDecoder` seam over raw video bytes
//! - An FFmpeg/FFprobe CLI implementation of that seam
//! - Deterministic, evenly spaced frame sampling plus a thumbnail

pub mod command;
pub mod decoder;
pub mod error;
pub mod probe;
pub mod sampler;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use decoder::{FfmpegDecoder, MediaDecoder};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use sampler::{sample_timestamps, FrameSampler, SampleSet, DEFAULT_MAX_FRAMES};
pub use thumbnail::{thumbnail_timestamp, THUMBNAIL_SCALE_WIDTH};
