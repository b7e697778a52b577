//! Progress reporting for long analysis runs.
//!
//! Attach a [`ProgressCallback`] through
//! [`AnalysisOptions::with_progress`](crate::AnalysisOptions::with_progress)
//! to observe a run frame by frame. Callbacks only observe: an analysis run
//! cannot be cancelled once streaming has begun.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framelag::{AnalysisOptions, Analyzer, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% ({} anomalies so far)", info.anomalies);
//!         }
//!     }
//! }
//!
//! let options = AnalysisOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_batch_size(30);
//! let report = Analyzer::new(options).run("capture.mp4", "annotated.mp4")?;
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot of analysis progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames fully processed (classified, rendered and written) so far.
    pub current: u64,
    /// Estimated total frame count, if the container reports a duration.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    ///
    /// The total is an estimate, so this may briefly exceed 100.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since streaming started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Number of non-normal frames found so far.
    pub anomalies: u64,
    /// Presentation timestamp of the most recent frame, in milliseconds.
    pub current_timestamp_ms: Option<f64>,
}

/// Trait for receiving progress updates during an analysis run.
///
/// Implementations must be [`Send`] and [`Sync`] because an
/// [`Analyzer`](crate::Analyzer) may be shared between threads running
/// independent analyses.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` frames and once when streaming ends.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. This is the default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Counts frames for one run and forwards snapshots to the callback.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    batch_size: u64,
    started: Instant,
    processed: u64,
    flagged: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            total: total.filter(|&frames| frames > 0),
            batch_size: batch_size.max(1),
            started: Instant::now(),
            processed: 0,
            flagged: 0,
        }
    }

    /// Count one written frame, notifying on every `batch_size`-th.
    pub(crate) fn advance(&mut self, timestamp_ms: f64, is_anomaly: bool) {
        self.processed += 1;
        self.flagged += u64::from(is_anomaly);

        if self.processed % self.batch_size == 0 {
            self.callback.on_progress(&self.snapshot(Some(timestamp_ms)));
        }
    }

    /// Notify once more after the last frame, whatever the batch position.
    pub(crate) fn finish(&mut self) {
        self.callback.on_progress(&self.snapshot(None));
    }

    fn snapshot(&self, current_timestamp_ms: Option<f64>) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        let remaining_frames = self
            .total
            .map(|total| total.saturating_sub(self.processed));

        ProgressInfo {
            current: self.processed,
            total: self.total,
            percentage: self
                .total
                .map(|total| self.processed as f32 * 100.0 / total as f32),
            elapsed,
            estimated_remaining: remaining_frames
                .filter(|_| self.processed > 0)
                .map(|frames| elapsed.mul_f64(frames as f64 / self.processed as f64)),
            anomalies: self.flagged,
            current_timestamp_ms,
        }
    }
}
