//! Thumbnail placement.

/// Thumbnail width in pixels; height follows the source aspect ratio.
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;

/// Preferred thumbnail position for long-enough videos (seconds).
pub const THUMBNAIL_TIMESTAMP_SECS: f64 = 1.0;

/// Thumbnail position for a video of `duration` seconds.
///
/// One second in, or the midpoint for clips shorter than two seconds.
pub fn thumbnail_timestamp(duration: f64) -> f64 {
    THUMBNAIL_TIMESTAMP_SECS.min(duration / 2.0).max(0.0)
}
