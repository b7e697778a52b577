//! Per-frame analysis results and aggregate statistics.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use crate::classifier::FrameStatus;

/// The classification outcome for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Zero-based position in decode order.
    pub frame_index: u64,
    /// Presentation timestamp in milliseconds.
    pub timestamp_ms: f64,
    /// Time since the previous frame in milliseconds; `0` for frame 0.
    pub gap_ms: f64,
    /// Structural similarity to the previous frame; `1.0` for frame 0.
    pub similarity: f64,
    /// The decided status.
    pub status: FrameStatus,
}

/// The result of a complete analysis run.
///
/// Records are in strictly increasing `frame_index` order and there is one
/// record per decoded frame.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// One record per decoded frame.
    pub records: Vec<FrameRecord>,
    /// Nominal frame rate of the source stream.
    pub fps: f64,
    /// Where the annotated video was written.
    pub output_path: PathBuf,
    /// Whether the playback transcode succeeded. When `false` the output
    /// holds the raw annotated encode.
    pub playback_optimized: bool,
}

impl AnalysisReport {
    /// Aggregate statistics over all records.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_records(&self.records, self.fps)
    }

    /// Records with a status other than [`FrameStatus::Normal`].
    pub fn anomalies(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.iter().filter(|record| record.status.is_anomaly())
    }

    /// Number of analysed frames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no frame was analysed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate statistics derived from a sequence of [`FrameRecord`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Number of records.
    pub total_frames: u64,
    /// Records whose status is not [`FrameStatus::Normal`].
    pub issues_found: u64,
    /// Records classified [`FrameStatus::FrameDropOrLag`].
    pub lag_frames: u64,
    /// Records classified [`FrameStatus::FrozenOrMerge`].
    pub frozen_frames: u64,
    /// Mean of `gap_ms` over all records, frame 0 included. `0` when empty.
    pub avg_gap_ms: f64,
    /// Nominal frame rate of the stream.
    pub fps: f64,
}

impl RunSummary {
    /// Compute the summary from records alone.
    pub fn from_records(records: &[FrameRecord], fps: f64) -> Self {
        let mut lag_frames = 0;
        let mut frozen_frames = 0;
        let mut gap_total = 0.0;

        for record in records {
            gap_total += record.gap_ms;
            match record.status {
                FrameStatus::FrameDropOrLag => lag_frames += 1,
                FrameStatus::FrozenOrMerge => frozen_frames += 1,
                FrameStatus::Normal => {}
            }
        }

        let avg_gap_ms = if records.is_empty() {
            0.0
        } else {
            gap_total / records.len() as f64
        };

        Self {
            total_frames: records.len() as u64,
            issues_found: lag_frames + frozen_frames,
            lag_frames,
            frozen_frames,
            avg_gap_ms,
            fps,
        }
    }

    /// A copy with `avg_gap_ms` and `fps` rounded to two decimals for
    /// display.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            avg_gap_ms: round2(self.avg_gap_ms),
            fps: round2(self.fps),
            ..*self
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(
            f,
            "Issues found: {} ({} drop/lag, {} frozen/merge)",
            self.issues_found, self.lag_frames, self.frozen_frames
        )?;
        writeln!(f, "Average gap:  {:.2} ms", self.avg_gap_ms)?;
        write!(f, "Frame rate:   {:.2} fps", self.fps)
    }
}

/// Round to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
