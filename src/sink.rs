//! Sequential frame encoding.
//!
//! [`FrameSink`] is the push interface the [`Analyzer`](crate::Analyzer)
//! writes annotated frames to. [`VideoSink`] implements it with FFmpeg: the
//! container is chosen from the file extension, frames are converted from
//! RGB to YUV 4:2:0 and encoded with consecutive timestamps at the declared
//! frame rate.
//!
//! # Example
//!
//! ```no_run
//! use framelag::{FrameSink, VideoSink, VideoSinkOptions};
//! use image::RgbImage;
//!
//! let mut sink = VideoSink::open("out.mp4", 30.0, 320, 240, VideoSinkOptions::default())?;
//! for shade in 0..30u8 {
//!     sink.write(&RgbImage::from_pixel(320, 240, image::Rgb([shade * 8, 0, 0])))?;
//! }
//! sink.finish()?;
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::encoder::video::Encoder as VideoEncoder;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Packet, Rational};
use image::RgbImage;

use crate::error::FramelagError;

/// Frame rate used for the container time base when the source does not
/// report one.
pub const FALLBACK_FPS: f64 = 30.0;

/// Receives annotated frames in order.
pub trait FrameSink {
    /// Encode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramelagError::DimensionMismatch`] if the frame size differs
    /// from the size the sink was opened with, or
    /// [`FramelagError::SinkWriteError`] on encoder or I/O failure.
    fn write(&mut self, frame: &RgbImage) -> Result<(), FramelagError>;

    /// Flush buffered frames and finalize the container.
    ///
    /// Calling `finish` more than once has no further effect.
    fn finish(&mut self) -> Result<(), FramelagError>;
}

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// MPEG-4 Part 2, fast and universally available. Used for the raw pass.
    #[default]
    Mpeg4,
    /// H.264 / AVC, preferring `libx264` when the build provides it.
    H264,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::Mpeg4 => Id::MPEG4,
            VideoCodec::H264 => Id::H264,
        }
    }

    fn find_encoder(self) -> Option<ffmpeg_next::codec::Codec> {
        match self {
            VideoCodec::H264 => ffmpeg_next::encoder::find_by_name("libx264")
                .or_else(|| ffmpeg_next::encoder::find(Id::H264)),
            VideoCodec::Mpeg4 => ffmpeg_next::encoder::find(self.to_codec_id()),
        }
    }
}

/// Options for [`VideoSink`].
#[derive(Debug, Clone)]
pub struct VideoSinkOptions {
    /// Codec to encode with. Default: MPEG-4 Part 2.
    pub codec: VideoCodec,
    /// Bitrate in bits per second. `None` picks one from resolution and fps.
    pub bitrate: Option<usize>,
    /// Constant Rate Factor, applied only to H.264.
    pub crf: Option<u32>,
    /// Place the MP4 index at the front of the file so playback can start
    /// before the whole file is downloaded.
    pub faststart: bool,
}

impl Default for VideoSinkOptions {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Mpeg4,
            bitrate: None,
            crf: None,
            faststart: false,
        }
    }
}

impl VideoSinkOptions {
    /// Options for a browser-friendly H.264 file with a front-loaded index.
    pub fn web() -> Self {
        Self {
            codec: VideoCodec::H264,
            bitrate: None,
            crf: Some(23),
            faststart: true,
        }
    }

    /// Set the codec.
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the target bitrate in bits per second.
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Set the CRF quality value (H.264 only).
    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Enable or disable the front-loaded MP4 index.
    pub fn faststart(mut self, enabled: bool) -> Self {
        self.faststart = enabled;
        self
    }
}

/// FFmpeg-backed [`FrameSink`].
///
/// Dropping a sink without calling [`finish`](FrameSink::finish) releases
/// all FFmpeg resources but leaves an unfinalized file behind.
pub struct VideoSink {
    output: Output,
    encoder: VideoEncoder,
    scaler: ScalingContext,
    rgb_frame: VideoFrame,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    next_pts: i64,
    finished: bool,
    path: PathBuf,
}

impl Debug for VideoSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSink")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_written", &self.next_pts)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl VideoSink {
    /// Create the output container and open the encoder.
    ///
    /// An `fps` of zero or below falls back to [`FALLBACK_FPS`].
    ///
    /// # Errors
    ///
    /// - [`FramelagError::SinkWriteError`] if the file cannot be created or
    ///   the header cannot be written.
    /// - [`FramelagError::VideoEncodeError`] if the codec is unavailable or
    ///   rejects the configuration.
    pub fn open<P: AsRef<Path>>(
        path: P,
        fps: f64,
        width: u32,
        height: u32,
        options: VideoSinkOptions,
    ) -> Result<Self, FramelagError> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|e| {
            FramelagError::SinkWriteError(format!("FFmpeg initialisation failed: {e}"))
        })?;

        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            log::warn!("Source reports no frame rate; writing {} at {FALLBACK_FPS} fps", path.display());
            FALLBACK_FPS
        };
        let frame_rate = crate::conversion::fps_to_rational(fps);
        let encoder_time_base = frame_rate.invert();

        log::debug!(
            "Opening video sink: {} ({}x{}, {:.3} fps, codec={:?})",
            path.display(),
            width,
            height,
            fps,
            options.codec,
        );

        let mut output = ffmpeg_next::format::output(&path)
            .map_err(|e| FramelagError::SinkWriteError(format!("cannot open output: {e}")))?;

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec = options.codec.find_encoder().ok_or_else(|| {
            FramelagError::VideoEncodeError(format!("codec {:?} not available", options.codec))
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|e| FramelagError::SinkWriteError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|e| {
                FramelagError::VideoEncodeError(format!("cannot create codec context: {e}"))
            })?
            .encoder()
            .video()
            .map_err(|e| {
                FramelagError::VideoEncodeError(format!("cannot open video encoder: {e}"))
            })?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_bit_rate(
            options
                .bitrate
                .unwrap_or_else(|| default_bitrate(width, height, fps)),
        );

        if needs_global_header {
            // SAFETY: the context is exclusively owned and not yet opened.
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let mut encoder_options = Dictionary::new();
        if options.codec == VideoCodec::H264 {
            encoder_options.set("preset", "medium");
            if let Some(crf) = options.crf {
                encoder_options.set("crf", &crf.to_string());
            }
        }

        let encoder = encoder
            .open_as_with(codec, encoder_options)
            .map_err(|e| FramelagError::VideoEncodeError(format!("cannot open encoder: {e}")))?;

        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        let mut muxer_options = Dictionary::new();
        if options.faststart {
            muxer_options.set("movflags", "+faststart");
        }
        output
            .write_header_with(muxer_options)
            .map_err(|e| FramelagError::SinkWriteError(format!("cannot write header: {e}")))?;

        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| FramelagError::SinkWriteError("output stream vanished".to_string()))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| FramelagError::SinkWriteError(format!("cannot create scaler: {e}")))?;

        Ok(Self {
            output,
            encoder,
            scaler,
            rgb_frame: VideoFrame::new(Pixel::RGB24, width, height),
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
            next_pts: 0,
            finished: false,
            path,
        })
    }

    /// Path the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames accepted so far.
    pub fn frames_written(&self) -> u64 {
        self.next_pts as u64
    }

    /// Write every packet the encoder has ready.
    fn drain_packets(&mut self) -> Result<(), FramelagError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| FramelagError::SinkWriteError(format!("write packet failed: {e}")))?;
        }
        Ok(())
    }
}

impl FrameSink for VideoSink {
    fn write(&mut self, frame: &RgbImage) -> Result<(), FramelagError> {
        if self.finished {
            return Err(FramelagError::SinkWriteError(
                "sink already finished".to_string(),
            ));
        }
        if frame.dimensions() != (self.width, self.height) {
            return Err(FramelagError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }

        crate::conversion::buffer_to_frame(
            frame.as_raw(),
            &mut self.rgb_frame,
            self.width,
            self.height,
            3,
        );

        // A fresh destination per frame: the encoder may keep references to
        // frames it has not emitted yet.
        let mut yuv_frame = VideoFrame::empty();
        self.scaler
            .run(&self.rgb_frame, &mut yuv_frame)
            .map_err(|e| FramelagError::SinkWriteError(format!("scaling failed: {e}")))?;
        yuv_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv_frame)
            .map_err(|e| FramelagError::SinkWriteError(format!("send_frame failed: {e}")))?;

        self.drain_packets()
    }

    fn finish(&mut self) -> Result<(), FramelagError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.encoder
            .send_eof()
            .map_err(|e| FramelagError::SinkWriteError(format!("send_eof failed: {e}")))?;
        self.drain_packets()?;

        self.output
            .write_trailer()
            .map_err(|e| FramelagError::SinkWriteError(format!("cannot write trailer: {e}")))?;

        log::debug!(
            "Finalized {} ({} frames)",
            self.path.display(),
            self.next_pts
        );
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!(
                "Dropping unfinished sink for {} after {} frames",
                self.path.display(),
                self.next_pts
            );
        }
    }
}

/// Roughly 0.15 bits per pixel per frame, never below 1 Mbit/s.
fn default_bitrate(width: u32, height: u32, fps: f64) -> usize {
    let estimate = width as f64 * height as f64 * fps * 0.15;
    (estimate as usize).max(1_000_000)
}
