//! Video stream metadata.
//!
//! [`StreamInfo`] is read once when a [`VideoSource`](crate::VideoSource) is
//! opened and stays constant for the lifetime of the source.

use std::time::Duration;

/// Properties of the video stream being analysed.
///
/// # Example
///
/// ```no_run
/// use framelag::{FrameSource, VideoSource};
///
/// let source = VideoSource::open("capture.mp4")?;
/// let info = source.info();
/// println!("{}x{} @ {:.2} fps", info.width, info.height, info.frames_per_second);
/// # Ok::<(), framelag::FramelagError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frames per second. `0.0` when the container does not say.
    pub frames_per_second: f64,
    /// Estimated total number of frames (duration × fps), `0` if unknown.
    pub frame_count: u64,
    /// Container duration, [`Duration::ZERO`] if unknown.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`), or `"unknown"`.
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}

impl StreamInfo {
    /// Stream info for frames that do not come from a container, such as
    /// synthetic or in-memory sources.
    pub fn new(width: u32, height: u32, frames_per_second: f64) -> Self {
        Self {
            width,
            height,
            frames_per_second,
            frame_count: 0,
            duration: Duration::ZERO,
            codec: "rawvideo".to_string(),
            format: "memory".to_string(),
        }
    }

    /// The estimated frame count, or `None` if it is unknown.
    pub fn estimated_frames(&self) -> Option<u64> {
        (self.frame_count > 0).then_some(self.frame_count)
    }
}
