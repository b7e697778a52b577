//! Error types for the `framelag` crate.
//!
//! This module defines [`FramelagError`], the unified error type returned by
//! all fallible operations in the crate. Source and sink failures are fatal
//! for a run; [`FramelagError::TranscodeFailure`] is only ever produced by a
//! [`PlaybackTranscoder`](crate::PlaybackTranscoder) and is swallowed by the
//! [`Analyzer`](crate::Analyzer).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framelag` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramelagError {
    /// The input could not be opened, has no video stream, or yielded no
    /// decodable frames.
    #[error("Source unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path of the input that was passed to the source.
        path: PathBuf,
        /// Underlying reason the source could not be used.
        reason: String,
    },

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The output container could not be written.
    #[error("Failed to write output: {0}")]
    SinkWriteError(String),

    /// A frame handed to the sink did not match the dimensions declared when
    /// the sink was opened.
    #[error(
        "Frame dimensions {}x{} do not match output dimensions {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    DimensionMismatch {
        /// `(width, height)` declared at open time.
        expected: (u32, u32),
        /// `(width, height)` of the rejected frame.
        actual: (u32, u32),
    },

    /// An encoder could not be found or configured.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// Re-encoding the output for playback failed.
    #[error("Transcode failed: {0}")]
    TranscodeFailure(String),

    /// Two frames with different dimensions were handed to a similarity
    /// scorer.
    #[error("Cannot score {}x{} against {}x{}", left.0, left.1, right.0, right.1)]
    SimilarityError {
        /// Dimensions of the first image.
        left: (u32, u32),
        /// Dimensions of the second image.
        right: (u32, u32),
    },

    /// An analysis option was outside its accepted range.
    #[error("Invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl FramelagError {
    /// Returns `true` for errors that abort a run.
    ///
    /// Only [`TranscodeFailure`](FramelagError::TranscodeFailure) is
    /// recoverable: the annotated file and the report stay valid.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FramelagError::TranscodeFailure(_))
    }
}

impl From<FfmpegError> for FramelagError {
    fn from(error: FfmpegError) -> Self {
        FramelagError::FfmpegError(error.to_string())
    }
}
