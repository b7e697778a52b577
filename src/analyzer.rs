//! The frame-analysis pipeline.
//!
//! [`Analyzer`] pulls frames from a [`FrameSource`], scores each against its
//! predecessor, classifies it, burns the status overlay in, pushes it to a
//! [`FrameSink`] and collects one [`FrameRecord`] per frame. Once the stream
//! ends the sink is finalized, both ends are released and the output is
//! handed to the [`PlaybackTranscoder`].
//!
//! A run is strictly sequential: frame `i + 1` is only read after frame `i`
//! has been written, because its classification needs frame `i`'s scoring
//! view. All per-run state lives in the call, so one `Analyzer` can serve
//! several runs concurrently as long as they use distinct paths.
//!
//! # Example
//!
//! ```no_run
//! use framelag::{AnalysisOptions, Analyzer};
//!
//! let report = Analyzer::new(AnalysisOptions::new()).run("capture.mp4", "annotated.mp4")?;
//! let summary = report.summary().rounded();
//! println!("{} of {} frames flagged", summary.issues_found, summary.total_frames);
//! for record in report.anomalies() {
//!     println!("#{} at {:.2} ms: {}", record.frame_index, record.timestamp_ms, record.status);
//! }
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;

use crate::{
    classifier::ClassificationThresholds,
    configuration::AnalysisOptions,
    error::FramelagError,
    overlay::{OverlayRenderer, TextOverlay},
    progress::ProgressTracker,
    report::{AnalysisReport, FrameRecord},
    similarity::{SimilarityScorer, StructuralSimilarity},
    sink::{FrameSink, VideoSink, VideoSinkOptions},
    source::{DecodedFrame, FrameSource, VideoSource},
    transcode::{PlaybackTranscoder, WebTranscoder},
};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Idle,
    Opened,
    Streaming,
    Finalizing,
    Closed,
    Errored,
}

impl PipelineState {
    fn transition(&mut self, next: PipelineState) {
        log::debug!("Pipeline {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// What a run carries from one frame to the next.
#[derive(Default)]
struct FrameCursor {
    previous: Option<(GrayImage, f64)>,
    index: u64,
}

impl FrameCursor {
    fn advance(self, view: GrayImage, timestamp_ms: f64) -> Self {
        Self {
            previous: Some((view, timestamp_ms)),
            index: self.index + 1,
        }
    }
}

/// Runs the analysis pipeline.
///
/// The scorer, overlay and transcoder are swappable; defaults are
/// [`StructuralSimilarity`], [`TextOverlay`] and [`WebTranscoder`].
#[derive(Clone)]
pub struct Analyzer {
    options: AnalysisOptions,
    scorer: Arc<dyn SimilarityScorer>,
    overlay: Arc<dyn OverlayRenderer>,
    transcoder: Option<Arc<dyn PlaybackTranscoder>>,
}

impl Debug for Analyzer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Analyzer")
            .field("options", &self.options)
            .field("has_transcoder", &self.transcoder.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisOptions::default())
    }
}

impl Analyzer {
    /// Create an analyzer with the default collaborators.
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options,
            scorer: Arc::new(StructuralSimilarity::new()),
            overlay: Arc::new(TextOverlay::new()),
            transcoder: Some(Arc::new(WebTranscoder::new())),
        }
    }

    /// Replace the similarity scorer.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the overlay renderer.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Arc<dyn OverlayRenderer>) -> Self {
        self.overlay = overlay;
        self
    }

    /// Replace the playback transcoder.
    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Arc<dyn PlaybackTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Keep the raw annotated encode; the report will say
    /// `playback_optimized: false`.
    #[must_use]
    pub fn without_transcoding(mut self) -> Self {
        self.transcoder = None;
        self
    }

    /// The options this analyzer runs with.
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Analyse `input` and write the annotated video to `output`.
    ///
    /// # Errors
    ///
    /// - [`FramelagError::InvalidOption`] if the options are out of range.
    /// - [`FramelagError::SourceUnavailable`] if the input cannot be opened
    ///   or contains no decodable frame.
    /// - [`FramelagError::SinkWriteError`], [`FramelagError::VideoEncodeError`]
    ///   or [`FramelagError::DimensionMismatch`] if the output cannot be
    ///   written.
    ///
    /// A failed playback transcode is not an error.
    pub fn run<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        input: P1,
        output: P2,
    ) -> Result<AnalysisReport, FramelagError> {
        self.options.validate()?;

        let source = VideoSource::open(input.as_ref())?;
        let info = source.info();
        let sink = VideoSink::open(
            output.as_ref(),
            info.frames_per_second,
            info.width,
            info.height,
            VideoSinkOptions::default(),
        )?;

        self.pipeline(source, sink, output.as_ref())
    }

    /// Run the pipeline over any source and sink.
    ///
    /// Both are consumed and released before the transcoder is invoked on
    /// `output`.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Analyzer::run), plus any error the source, sink or
    /// scorer return.
    pub fn run_with<S, K, P>(
        &self,
        source: S,
        sink: K,
        output: P,
    ) -> Result<AnalysisReport, FramelagError>
    where
        S: FrameSource,
        K: FrameSink,
        P: AsRef<Path>,
    {
        self.options.validate()?;
        self.pipeline(source, sink, output.as_ref())
    }

    fn pipeline<S: FrameSource, K: FrameSink>(
        &self,
        mut source: S,
        mut sink: K,
        output: &Path,
    ) -> Result<AnalysisReport, FramelagError> {
        let mut state = PipelineState::Idle;
        let fps = source.info().frames_per_second;
        let thresholds = ClassificationThresholds::from_fps(fps, &self.options);
        state.transition(PipelineState::Opened);

        log::info!(
            "Analyzing {} -> {} (fps={:.3}, jitter threshold={:.3} ms, freeze cutoff={})",
            source
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<stream>".to_string()),
            output.display(),
            fps,
            thresholds.jitter_threshold_ms,
            thresholds.freeze_similarity_cutoff,
        );

        state.transition(PipelineState::Streaming);
        let records = match self.stream(&mut source, &mut sink, &thresholds) {
            Ok(records) => records,
            Err(error) => {
                state.transition(PipelineState::Errored);
                log::error!("Analysis aborted: {error}");
                return Err(error);
            }
        };

        if records.is_empty() {
            state.transition(PipelineState::Errored);
            return Err(FramelagError::SourceUnavailable {
                path: source.path().map(Path::to_path_buf).unwrap_or_default(),
                reason: "no decodable frames".to_string(),
            });
        }

        state.transition(PipelineState::Finalizing);
        if let Err(error) = sink.finish() {
            state.transition(PipelineState::Errored);
            log::error!("Cannot finalize {}: {error}", output.display());
            return Err(error);
        }

        drop(sink);
        drop(source);

        let playback_optimized = match &self.transcoder {
            Some(transcoder) => match transcoder.transcode(output) {
                Ok(()) => true,
                Err(error) => {
                    log::warn!(
                        "Playback transcode failed; keeping raw output {}: {error}",
                        output.display()
                    );
                    false
                }
            },
            None => false,
        };
        state.transition(PipelineState::Closed);

        let report = AnalysisReport {
            records,
            fps,
            output_path: output.to_path_buf(),
            playback_optimized,
        };
        let summary = report.summary();
        log::info!(
            "Analyzed {} frames: {} drop/lag, {} frozen/merge, mean gap {:.2} ms",
            summary.total_frames,
            summary.lag_frames,
            summary.frozen_frames,
            summary.avg_gap_ms,
        );

        Ok(report)
    }

    /// The frame loop. Returns every record, or the first error.
    fn stream<S: FrameSource, K: FrameSink>(
        &self,
        source: &mut S,
        sink: &mut K,
        thresholds: &ClassificationThresholds,
    ) -> Result<Vec<FrameRecord>, FramelagError> {
        let total = source.info().estimated_frames();
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            total,
            self.options.batch_size,
        );
        let mut records = Vec::with_capacity(total.unwrap_or(0).min(1 << 16) as usize);
        let mut cursor = FrameCursor::default();

        while let Some(frame) = source.next_frame()? {
            let (record, view) = self.process_frame(frame, &cursor, sink, thresholds)?;
            tracker.advance(record.timestamp_ms, record.status.is_anomaly());
            cursor = cursor.advance(view, record.timestamp_ms);
            records.push(record);
        }

        tracker.finish();
        Ok(records)
    }

    /// Score, classify, render and write one frame.
    fn process_frame<K: FrameSink>(
        &self,
        frame: DecodedFrame,
        cursor: &FrameCursor,
        sink: &mut K,
        thresholds: &ClassificationThresholds,
    ) -> Result<(FrameRecord, GrayImage), FramelagError> {
        let DecodedFrame {
            mut image,
            timestamp_ms,
        } = frame;
        let (width, height) = self.options.scoring_resolution();
        let view = crate::similarity::scoring_view(&image, width, height);

        let (gap_ms, similarity) = match &cursor.previous {
            None => (0.0, 1.0),
            Some((previous_view, previous_timestamp_ms)) => (
                (timestamp_ms - previous_timestamp_ms).max(0.0),
                self.scorer.score(previous_view, &view)?,
            ),
        };

        let status = thresholds.classify(cursor.index, gap_ms, similarity);
        log::trace!(
            "Frame {} at {timestamp_ms:.3} ms: gap={gap_ms:.3} ms, similarity={similarity:.4}, {status}",
            cursor.index,
        );

        self.overlay.render(&mut image, timestamp_ms, status);
        sink.write(&image)?;

        Ok((
            FrameRecord {
                frame_index: cursor.index,
                timestamp_ms,
                gap_ms,
                similarity,
                status,
            },
            view,
        ))
    }
}

/// Analyse `input` into `output` with default options and collaborators.
///
/// # Errors
///
/// See [`Analyzer::run`].
pub fn analyze<P1: AsRef<Path>, P2: AsRef<Path>>(
    input: P1,
    output: P2,
) -> Result<AnalysisReport, FramelagError> {
    Analyzer::default().run(input, output)
}
