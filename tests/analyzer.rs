//! Pipeline tests against in-memory sources and sinks.

mod common;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use framelag::{
    AnalysisOptions, Analyzer, FrameStatus, FramelagError, NoOverlay, ProgressCallback,
    ProgressInfo,
};
use image::Rgb;

use common::{
    HEIGHT, MemorySource, RecordingSink, RecordingTranscoder, SinkLog, WIDTH, noise_frame,
};

const OUTPUT: &str = "annotated.mp4";

fn analyzer_with(transcoder: &Arc<RecordingTranscoder>) -> Analyzer {
    Analyzer::new(AnalysisOptions::new().with_scoring_resolution(WIDTH, HEIGHT))
        .with_transcoder(transcoder.clone())
}

/// 30 fps: a fresh frame, a repeat, a late fresh frame, a late repeat.
fn mixed_source() -> MemorySource {
    MemorySource::new(
        30.0,
        vec![
            (0.0, noise_frame(1)),
            (33.3, noise_frame(2)),
            (66.7, noise_frame(2)),
            (133.3, noise_frame(3)),
            (166.7, noise_frame(3)),
            (300.0, noise_frame(3)),
        ],
    )
}

#[test]
fn classifies_every_frame() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    let statuses: Vec<FrameStatus> = report.records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            FrameStatus::Normal,
            FrameStatus::Normal,
            FrameStatus::FrozenOrMerge,
            FrameStatus::FrameDropOrLag,
            FrameStatus::FrozenOrMerge,
            // Identical and late: the gap wins.
            FrameStatus::FrameDropOrLag,
        ]
    );
    assert_eq!(report.fps, 30.0);
    assert_eq!(report.output_path, PathBuf::from(OUTPUT));
}

#[test]
fn first_record_has_no_gap() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let source = MemorySource::new(30.0, vec![(500.0, noise_frame(1)), (533.3, noise_frame(1))]);
    let report = analyzer_with(&transcoder)
        .run_with(source, RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    let first = report.records[0];
    assert_eq!(first.frame_index, 0);
    assert_eq!(first.gap_ms, 0.0);
    assert_eq!(first.similarity, 1.0);
    assert_eq!(first.status, FrameStatus::Normal);
    assert_eq!(first.timestamp_ms, 500.0);

    let second = report.records[1];
    assert!((second.gap_ms - 33.3).abs() < 1e-9);
    assert!(second.similarity > 0.999);
}

#[test]
fn one_record_and_one_written_frame_per_decoded_frame() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert_eq!(report.len(), 6);
    assert_eq!(log.frames().len(), 6);
    assert!(log.finished());
    for (position, record) in report.records.iter().enumerate() {
        assert_eq!(record.frame_index, position as u64);
        assert!(record.gap_ms >= 0.0);
        assert!((-1.0..=1.0).contains(&record.similarity));
    }
}

#[test]
fn written_frames_carry_the_overlay() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    for (frame, record) in log.frames().iter().zip(&report.records) {
        assert_eq!(frame.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(*frame.get_pixel(12, 12), Rgb([0, 0, 0]));
        let Rgb(color) = framelag::overlay::status_color(record.status);
        let lit = frame.enumerate_pixels().filter(|(x, y, pixel)| {
            (10..65).contains(y)
                && (10..WIDTH).contains(x)
                && pixel.0.iter().zip(color).all(|(&a, b)| a.abs_diff(b) <= 8)
        });
        assert!(lit.count() > 20, "frame {} has no label", record.frame_index);
    }
}

#[test]
fn overlay_does_not_affect_classification() {
    let transcoder = Arc::new(RecordingTranscoder::default());

    let with_text = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&SinkLog::default()), OUTPUT)
        .expect("analysis");

    let log = SinkLog::default();
    let without_text = analyzer_with(&transcoder)
        .with_overlay(Arc::new(NoOverlay))
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert_eq!(with_text.records, without_text.records);
    assert_eq!(log.frames()[0], noise_frame(1));
}

#[test]
fn empty_source_is_an_error() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let result = analyzer_with(&transcoder).run_with(
        MemorySource::new(30.0, Vec::new()),
        RecordingSink::new(&log),
        OUTPUT,
    );

    match result {
        Err(FramelagError::SourceUnavailable { path, reason }) => {
            assert_eq!(path, Path::new("memory.mp4"));
            assert!(reason.contains("no decodable frames"));
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
    assert!(transcoder.calls().is_empty());
}

#[test]
fn empty_source_is_reported_before_the_sink_is_finalized() {
    let log = SinkLog::default();

    let result = Analyzer::new(AnalysisOptions::new())
        .without_transcoding()
        .run_with(
            MemorySource::new(30.0, Vec::new()),
            RecordingSink::new(&log).failing_finish(),
            OUTPUT,
        );

    assert!(matches!(result, Err(FramelagError::SourceUnavailable { .. })));
    assert!(!log.finished());
}

#[test]
fn finalize_failure_aborts_the_run() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let result = analyzer_with(&transcoder).run_with(
        mixed_source(),
        RecordingSink::new(&log).failing_finish(),
        OUTPUT,
    );

    assert!(matches!(result, Err(FramelagError::SinkWriteError(_))));
    assert_eq!(log.frames().len(), 6);
    assert!(transcoder.calls().is_empty());
}

#[test]
fn transcoder_runs_on_output_after_sink_is_finished() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert!(report.playback_optimized);
    assert!(log.finished());
    assert_eq!(transcoder.calls(), vec![PathBuf::from(OUTPUT)]);
}

#[test]
fn transcode_failure_keeps_the_report() {
    let transcoder = Arc::new(RecordingTranscoder::failing());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("transcode failure is not fatal");

    assert!(!report.playback_optimized);
    assert_eq!(report.len(), 6);
    assert_eq!(transcoder.calls().len(), 1);
}

#[test]
fn transcoding_can_be_disabled() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let report = analyzer_with(&transcoder)
        .without_transcoding()
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert!(!report.playback_optimized);
    assert!(transcoder.calls().is_empty());
}

#[test]
fn sink_failure_aborts_the_run() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let result = analyzer_with(&transcoder).run_with(
        mixed_source(),
        RecordingSink::new(&log).failing_at(2),
        OUTPUT,
    );

    assert!(matches!(result, Err(FramelagError::SinkWriteError(_))));
    assert_eq!(log.frames().len(), 2);
    assert!(!log.finished());
    assert!(transcoder.calls().is_empty());
}

#[test]
fn sink_dimension_mismatch_aborts_the_run() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let result = analyzer_with(&transcoder).run_with(
        mixed_source(),
        RecordingSink::new(&log).with_dimensions(WIDTH * 2, HEIGHT),
        OUTPUT,
    );

    match result {
        Err(FramelagError::DimensionMismatch { expected, actual }) => {
            assert_eq!(expected, (WIDTH * 2, HEIGHT));
            assert_eq!(actual, (WIDTH, HEIGHT));
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[test]
fn decode_failure_aborts_the_run() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let result = analyzer_with(&transcoder).run_with(
        mixed_source().failing_after(3),
        RecordingSink::new(&log),
        OUTPUT,
    );

    assert!(matches!(result, Err(FramelagError::VideoDecodeError(_))));
    assert_eq!(log.frames().len(), 3);
    assert!(transcoder.calls().is_empty());
}

#[test]
fn invalid_options_are_rejected_before_streaming() {
    let log = SinkLog::default();

    let result = Analyzer::new(AnalysisOptions::new().with_jitter_multiplier(f64::NAN))
        .without_transcoding()
        .run_with(mixed_source(), RecordingSink::new(&log), OUTPUT);

    assert!(matches!(
        result,
        Err(FramelagError::InvalidOption {
            name: "jitter_multiplier",
            ..
        })
    ));
    assert!(log.frames().is_empty());
}

#[test]
fn unknown_frame_rate_flags_every_gap() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let source = MemorySource::new(
        0.0,
        vec![
            (0.0, noise_frame(1)),
            (1.0, noise_frame(2)),
            (1.0, noise_frame(3)),
        ],
    );
    let report = analyzer_with(&transcoder)
        .run_with(source, RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert_eq!(report.records[1].status, FrameStatus::FrameDropOrLag);
    assert_eq!(report.records[2].status, FrameStatus::Normal);
}

#[test]
fn backwards_timestamps_clamp_the_gap() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let log = SinkLog::default();

    let source = MemorySource::new(30.0, vec![(100.0, noise_frame(1)), (50.0, noise_frame(2))]);
    let report = analyzer_with(&transcoder)
        .run_with(source, RecordingSink::new(&log), OUTPUT)
        .expect("analysis");

    assert_eq!(report.records[1].gap_ms, 0.0);
}

#[test]
fn stricter_cutoff_reduces_freezes() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let options = AnalysisOptions::new()
        .with_scoring_resolution(WIDTH, HEIGHT)
        .with_freeze_similarity_cutoff(1.0);

    let report = Analyzer::new(options)
        .with_transcoder(transcoder)
        .run_with(mixed_source(), RecordingSink::new(&SinkLog::default()), OUTPUT)
        .expect("analysis");

    assert!(report
        .records
        .iter()
        .all(|record| record.status != FrameStatus::FrozenOrMerge));
}

struct CollectingProgress {
    updates: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for CollectingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.updates.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_reports_frames_and_anomalies() {
    let progress = Arc::new(CollectingProgress {
        updates: Mutex::new(Vec::new()),
    });
    let options = AnalysisOptions::new()
        .with_scoring_resolution(WIDTH, HEIGHT)
        .with_progress(progress.clone())
        .with_batch_size(2);

    Analyzer::new(options)
        .without_transcoding()
        .run_with(mixed_source(), RecordingSink::new(&SinkLog::default()), OUTPUT)
        .expect("analysis");

    let updates = progress.updates.lock().unwrap();
    // Three batches of two, plus the final report.
    assert_eq!(updates.len(), 4);
    let last = updates.last().unwrap();
    assert_eq!(last.current, 6);
    assert_eq!(last.total, Some(6));
    assert_eq!(last.anomalies, 4);
    assert_eq!(updates[0].current, 2);
    assert_eq!(updates[0].current_timestamp_ms, Some(33.3));
}

#[test]
fn analyzer_is_reusable_across_runs() {
    let transcoder = Arc::new(RecordingTranscoder::default());
    let analyzer = analyzer_with(&transcoder);

    let first = analyzer
        .run_with(mixed_source(), RecordingSink::new(&SinkLog::default()), OUTPUT)
        .expect("first run");
    let second = analyzer
        .run_with(mixed_source(), RecordingSink::new(&SinkLog::default()), OUTPUT)
        .expect("second run");

    assert_eq!(first.records, second.records);
    assert_eq!(transcoder.calls().len(), 2);
}
