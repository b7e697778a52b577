//! Re-encoding annotated output for browser playback.
//!
//! The raw annotated file is written with a fast intra-friendly codec.
//! [`WebTranscoder`] re-encodes it in place to H.264 / YUV 4:2:0 in an MP4
//! whose index sits at the front of the file, which is what browsers need
//! to start playing before the download finishes.
//!
//! The [`Analyzer`](crate::Analyzer) treats transcoding as best effort: a
//! failure is logged and the raw file is kept.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FramelagError;
use crate::sink::{FrameSink, VideoSink, VideoSinkOptions};
use crate::source::{FrameSource, VideoSource};

/// Re-encodes a finished output file in place.
pub trait PlaybackTranscoder: Send + Sync {
    /// Transcode the file at `path`, replacing it on success.
    ///
    /// On failure the original file must be left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FramelagError::TranscodeFailure`] describing the cause.
    fn transcode(&self, path: &Path) -> Result<(), FramelagError>;
}

/// H.264 + faststart transcoder built on [`VideoSource`] and [`VideoSink`].
#[derive(Debug, Clone)]
pub struct WebTranscoder {
    options: VideoSinkOptions,
}

impl Default for WebTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebTranscoder {
    /// Create a transcoder with [`VideoSinkOptions::web`].
    pub fn new() -> Self {
        Self {
            options: VideoSinkOptions::web(),
        }
    }

    /// Override the encoder options.
    pub fn with_options(mut self, options: VideoSinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Sibling path the transcode is written to before replacing the
    /// original: `clip.mp4` becomes `clip_temp.mp4`.
    pub fn temporary_path(path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(extension) => format!("{stem}_temp.{}", extension.to_string_lossy()),
            None => format!("{stem}_temp"),
        };
        path.with_file_name(name)
    }

    fn transcode_into(&self, input: &Path, output: &Path) -> Result<u64, FramelagError> {
        let mut source = VideoSource::open(input)?;
        let info = source.info().clone();
        let mut sink = VideoSink::open(
            output,
            info.frames_per_second,
            info.width,
            info.height,
            self.options.clone(),
        )?;

        while let Some(frame) = source.next_frame()? {
            sink.write(&frame.image)?;
        }
        sink.finish()?;
        Ok(sink.frames_written())
    }
}

impl PlaybackTranscoder for WebTranscoder {
    fn transcode(&self, path: &Path) -> Result<(), FramelagError> {
        let temporary = Self::temporary_path(path);
        log::info!(
            "Transcoding {} for playback (codec={:?}, faststart={})",
            path.display(),
            self.options.codec,
            self.options.faststart,
        );

        match self.transcode_into(path, &temporary) {
            Ok(frames) => {
                fs::rename(&temporary, path).map_err(|e| {
                    let _ = fs::remove_file(&temporary);
                    FramelagError::TranscodeFailure(format!(
                        "cannot replace {}: {e}",
                        path.display()
                    ))
                })?;
                log::debug!("Transcoded {frames} frames into {}", path.display());
                Ok(())
            }
            Err(error) => {
                if temporary.exists() {
                    let _ = fs::remove_file(&temporary);
                }
                Err(FramelagError::TranscodeFailure(error.to_string()))
            }
        }
    }
}
