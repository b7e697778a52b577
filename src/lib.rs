//! # framelag
//!
//! Find dropped, lagging and frozen frames in a recorded video.
//!
//! `framelag` decodes a video frame by frame, measures the presentation-time
//! gap and the structural similarity between each frame and its
//! predecessor, and classifies every frame as normal, a drop/lag (the gap is
//! too long for the declared frame rate) or a freeze/merge (the picture
//! barely changed). It writes an annotated copy of the video with the
//! timestamp and verdict burned into the top-left corner of each frame, and
//! returns a per-frame report plus a summary. Decoding and encoding go
//! through FFmpeg via [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next).
//!
//! ## Quick Start
//!
//! ```no_run
//! use framelag::{AnalysisOptions, Analyzer};
//!
//! let analyzer = Analyzer::new(AnalysisOptions::new().with_jitter_multiplier(1.5));
//! let report = analyzer.run("capture.mp4", "capture_annotated.mp4")?;
//!
//! println!("{}", report.summary());
//! # Ok::<(), framelag::FramelagError>(())
//! ```
//!
//! ### Custom sources and sinks
//!
//! Anything that yields RGB frames with timestamps can be analysed by
//! implementing [`FrameSource`]; anything that accepts RGB frames can receive
//! the annotated output by implementing [`FrameSink`]. Pass them to
//! [`Analyzer::run_with`].
//!
//! ## Classification
//!
//! With `expected = 1000 / fps` milliseconds, frame `i > 0` is
//!
//! - [`FrameStatus::FrameDropOrLag`] when its gap exceeds
//!   `expected * jitter_multiplier` (default 1.3), otherwise
//! - [`FrameStatus::FrozenOrMerge`] when its similarity to frame `i - 1`
//!   exceeds the freeze cutoff (default 0.985), otherwise
//! - [`FrameStatus::Normal`].
//!
//! Frame 0 is always normal.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod analyzer;
pub mod classifier;
pub mod configuration;
mod conversion;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod overlay;
pub mod progress;
pub mod report;
pub mod similarity;
pub mod sink;
pub mod source;
pub mod transcode;

pub use analyzer::{Analyzer, analyze};
pub use classifier::{ClassificationThresholds, FrameStatus};
pub use configuration::AnalysisOptions;
pub use error::FramelagError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::StreamInfo;
pub use overlay::{NoOverlay, OverlayRenderer, TextOverlay, format_timestamp};
pub use progress::{ProgressCallback, ProgressInfo};
pub use report::{AnalysisReport, FrameRecord, RunSummary};
pub use similarity::{SimilarityScorer, StructuralSimilarity, scoring_view};
pub use sink::{FrameSink, VideoCodec, VideoSink, VideoSinkOptions};
pub use source::{DecodedFrame, FrameSource, VideoSource};
pub use transcode::{PlaybackTranscoder, WebTranscoder};
