//! In-memory stand-ins for the pipeline's collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use framelag::{
    DecodedFrame, FrameSink, FrameSource, FramelagError, PlaybackTranscoder, StreamInfo,
};
use image::{Rgb, RgbImage};

pub const WIDTH: u32 = 160;
pub const HEIGHT: u32 = 96;

/// Deterministic noise so that distinct seeds give structurally unrelated
/// frames.
pub fn noise_frame(seed: u32) -> RgbImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    RgbImage::from_fn(WIDTH, HEIGHT, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let value = (state >> 16) as u8;
        Rgb([value, value.wrapping_add(40), value.wrapping_mul(3)])
    })
}

pub fn solid_frame(color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(color))
}

/// A source that hands out a fixed list of frames, optionally failing at a
/// given position.
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<DecodedFrame>,
    fail_after: Option<usize>,
    served: usize,
}

impl MemorySource {
    pub fn new(fps: f64, frames: Vec<(f64, RgbImage)>) -> Self {
        let (width, height) = frames
            .first()
            .map(|(_, image)| image.dimensions())
            .unwrap_or((WIDTH, HEIGHT));
        let mut info = StreamInfo::new(width, height, fps);
        info.frame_count = frames.len() as u64;
        Self {
            info,
            frames: frames
                .into_iter()
                .map(|(timestamp_ms, image)| DecodedFrame {
                    image,
                    timestamp_ms,
                })
                .collect(),
            fail_after: None,
            served: 0,
        }
    }

    /// Return a decode error once `count` frames have been served.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FramelagError> {
        if self.fail_after == Some(self.served) {
            return Err(FramelagError::VideoDecodeError("corrupt packet".to_string()));
        }
        self.served += 1;
        Ok(self.frames.pop_front())
    }

    fn path(&self) -> Option<&Path> {
        Some(Path::new("memory.mp4"))
    }
}

/// What a [`RecordingSink`] saw, shared with the test after the sink has
/// been consumed.
#[derive(Clone, Default)]
pub struct SinkLog {
    pub frames: Arc<Mutex<Vec<RgbImage>>>,
    pub finished: Arc<AtomicBool>,
}

impl SinkLog {
    pub fn frames(&self) -> Vec<RgbImage> {
        self.frames.lock().unwrap().clone()
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

pub struct RecordingSink {
    log: SinkLog,
    dimensions: (u32, u32),
    fail_at: Option<usize>,
    fail_finish: bool,
}

impl RecordingSink {
    pub fn new(log: &SinkLog) -> Self {
        Self {
            log: log.clone(),
            dimensions: (WIDTH, HEIGHT),
            fail_at: None,
            fail_finish: false,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = (width, height);
        self
    }

    /// Reject the write of frame `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Reject the final flush.
    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }
}

impl FrameSink for RecordingSink {
    fn write(&mut self, frame: &RgbImage) -> Result<(), FramelagError> {
        if frame.dimensions() != self.dimensions {
            return Err(FramelagError::DimensionMismatch {
                expected: self.dimensions,
                actual: frame.dimensions(),
            });
        }
        let mut frames = self.log.frames.lock().unwrap();
        if self.fail_at == Some(frames.len()) {
            return Err(FramelagError::SinkWriteError("disk full".to_string()));
        }
        frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FramelagError> {
        if self.fail_finish {
            return Err(FramelagError::SinkWriteError("trailer rejected".to_string()));
        }
        self.log.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every path it is asked to transcode.
#[derive(Default)]
pub struct RecordingTranscoder {
    pub calls: Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

impl RecordingTranscoder {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl PlaybackTranscoder for RecordingTranscoder {
    fn transcode(&self, path: &Path) -> Result<(), FramelagError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            Err(FramelagError::TranscodeFailure("no H.264 encoder".to_string()))
        } else {
            Ok(())
        }
    }
}
