//! Sequential frame decoding.
//!
//! [`FrameSource`] is the pull interface the [`Analyzer`](crate::Analyzer)
//! reads from. [`VideoSource`] implements it on top of FFmpeg: it opens a
//! container, picks the best video stream and decodes frames one at a time
//! in presentation order, converting each to RGB together with its
//! presentation timestamp in milliseconds.
//!
//! Timestamps are reported as the decoder sees them. Uneven spacing between
//! consecutive timestamps is exactly what the analysis measures, so nothing
//! is smoothed or re-timed here; timestamps are only clamped so that they
//! never run backwards.
//!
//! # Example
//!
//! ```no_run
//! use framelag::VideoSource;
//!
//! let source = VideoSource::open("capture.mp4")?;
//! for frame in source {
//!     let frame = frame?;
//!     println!("{:.2} ms: {}x{}", frame.timestamp_ms, frame.image.width(), frame.image.height());
//! }
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{error::FramelagError, metadata::StreamInfo};

/// A decoded frame and its presentation timestamp.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Full-resolution RGB pixels.
    pub image: RgbImage,
    /// Presentation timestamp relative to the start of the stream, in
    /// milliseconds.
    pub timestamp_ms: f64,
}

/// A finite, non-restartable sequence of frames in capture order.
pub trait FrameSource {
    /// Properties of the stream, known before the first frame is read.
    fn info(&self) -> &StreamInfo;

    /// Decode the next frame, or return `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource fails mid-stream. The
    /// source must not be read again after an error.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FramelagError>;

    /// Where the frames come from, if they come from a file.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Scaler for the current decoded frame geometry.
struct Converter {
    context: ScalingContext,
    format: Pixel,
    width: u32,
    height: u32,
}

/// FFmpeg-backed [`FrameSource`].
///
/// The demuxer and decoder are owned exclusively by this value and released
/// when it is dropped.
pub struct VideoSource {
    input_context: Input,
    decoder: VideoDecoder,
    converter: Option<Converter>,
    stream_index: usize,
    time_base: Rational,
    start_pts: Option<i64>,
    info: StreamInfo,
    path: PathBuf,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    last_timestamp_ms: f64,
    frames_decoded: u64,
    eof_sent: bool,
    done: bool,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("stream_index", &self.stream_index)
            .field("frames_decoded", &self.frames_decoded)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a container and prepare its best video stream for decoding.
    ///
    /// # Errors
    ///
    /// Returns [`FramelagError::SourceUnavailable`] if the file cannot be
    /// opened, contains no video stream, or its decoder cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramelagError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| FramelagError::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable("no video stream found".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_pts = Some(stream.start_time()).filter(|&pts| pts != ffmpeg_sys_next::AV_NOPTS_VALUE);

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 && frame_rate.numerator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| unavailable(format!("cannot read codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| unavailable(format!("cannot create video decoder: {error}")))?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };
        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        if info.width == 0 || info.height == 0 {
            return Err(unavailable(format!(
                "video stream reports invalid dimensions {}x{}",
                info.width, info.height
            )));
        }

        log::info!(
            "Opened video source: {} ({}x{}, {:.2} fps, codec={}, ~{} frames)",
            path.display(),
            info.width,
            info.height,
            info.frames_per_second,
            info.codec,
            info.frame_count,
        );

        Ok(Self {
            input_context,
            decoder,
            converter: None,
            stream_index,
            time_base,
            start_pts,
            info,
            path,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            last_timestamp_ms: 0.0,
            frames_decoded: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Number of frames returned so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Timestamp of the current decoded frame, clamped to be non-decreasing.
    fn current_timestamp_ms(&mut self) -> f64 {
        let pts = self.decoded_frame.timestamp().or(self.decoded_frame.pts());
        let timestamp_ms = match pts {
            Some(pts) => {
                let relative = pts - self.start_pts.unwrap_or(0);
                crate::conversion::pts_to_millis(relative, self.time_base).max(0.0)
            }
            None => self.last_timestamp_ms,
        };

        self.last_timestamp_ms = timestamp_ms.max(self.last_timestamp_ms);
        self.last_timestamp_ms
    }

    /// Convert the current decoded frame to RGB at the stream's declared size.
    fn convert_current_frame(&mut self) -> Result<RgbImage, FramelagError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        let stale = self
            .converter
            .as_ref()
            .is_none_or(|c| c.format != format || c.width != width || c.height != height);
        if stale {
            log::debug!(
                "Configuring scaler {:?} {}x{} -> RGB24 {}x{}",
                format,
                width,
                height,
                self.info.width,
                self.info.height,
            );
            let context = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                self.info.width,
                self.info.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| {
                FramelagError::VideoDecodeError(format!("cannot create scaler: {error}"))
            })?;
            self.converter = Some(Converter {
                context,
                format,
                width,
                height,
            });
        }

        let converter = self.converter.as_mut().ok_or_else(|| {
            FramelagError::VideoDecodeError("scaler unavailable".to_string())
        })?;
        converter
            .context
            .run(&self.decoded_frame, &mut self.rgb_frame)?;

        let buffer = crate::conversion::frame_to_buffer(
            &self.rgb_frame,
            self.info.width,
            self.info.height,
            3,
        );
        RgbImage::from_raw(self.info.width, self.info.height, buffer).ok_or_else(|| {
            FramelagError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

impl FrameSource for VideoSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FramelagError> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let timestamp_ms = self.current_timestamp_ms();
                let image = self.convert_current_frame().inspect_err(|_| self.done = true)?;
                self.frames_decoded += 1;
                log::trace!("Decoded frame {} at {timestamp_ms:.3} ms", self.frames_decoded - 1);
                return Ok(Some(DecodedFrame {
                    image,
                    timestamp_ms,
                }));
            }

            if self.eof_sent {
                log::debug!(
                    "End of stream after {} frames: {}",
                    self.frames_decoded,
                    self.path.display()
                );
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        // The decoder resynchronises on a later keyframe.
                        log::debug!("Skipping undecodable packet: {error}");
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof().inspect_err(|_| self.done = true)?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    self.done = true;
                    return Err(FramelagError::VideoDecodeError(format!(
                        "cannot read packet: {error}"
                    )));
                }
            }
        }
    }
}

impl Iterator for VideoSource {
    type Item = Result<DecodedFrame, FramelagError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
