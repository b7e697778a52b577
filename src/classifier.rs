//! Frame status classification.
//!
//! [`ClassificationThresholds`] is derived once per run from the stream's
//! nominal frame rate and never changes afterwards.
//! [`classify`](ClassificationThresholds::classify) is a pure function of the
//! frame index, the gap to the previous frame and the similarity to the
//! previous frame.
//!
//! A frame that is both late and visually static is reported as
//! [`FrameStatus::FrameDropOrLag`]: the gap check runs first.
//!
//! # Example
//!
//! ```
//! use framelag::{AnalysisOptions, ClassificationThresholds, FrameStatus};
//!
//! let thresholds = ClassificationThresholds::from_fps(30.0, &AnalysisOptions::new());
//! assert_eq!(thresholds.classify(5, 60.0, 0.5), FrameStatus::FrameDropOrLag);
//! assert_eq!(thresholds.classify(6, 30.0, 0.99), FrameStatus::FrozenOrMerge);
//! assert_eq!(thresholds.classify(7, 30.0, 0.7), FrameStatus::Normal);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::configuration::AnalysisOptions;

/// The outcome of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameStatus {
    /// On time and visually distinct from its predecessor.
    #[default]
    Normal,
    /// Arrived later than the jitter threshold allows.
    FrameDropOrLag,
    /// Arrived on time but is structurally near-identical to its predecessor.
    FrozenOrMerge,
}

impl FrameStatus {
    /// Human-readable label, as burned into the overlay and reported.
    pub fn label(self) -> &'static str {
        match self {
            FrameStatus::Normal => "Normal",
            FrameStatus::FrameDropOrLag => "Frame Drop/Lag",
            FrameStatus::FrozenOrMerge => "Frozen/Merge",
        }
    }

    /// Returns `true` for every status other than [`FrameStatus::Normal`].
    pub fn is_anomaly(self) -> bool {
        self != FrameStatus::Normal
    }
}

impl Display for FrameStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}

/// Decision thresholds for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationThresholds {
    /// Nominal interval between frames, `1000 / fps` (0 when fps ≤ 0).
    pub expected_delta_ms: f64,
    /// Largest gap tolerated before a frame counts as dropped or delayed.
    pub jitter_threshold_ms: f64,
    /// Similarity above which an on-time frame counts as frozen.
    pub freeze_similarity_cutoff: f64,
}

impl ClassificationThresholds {
    /// Derive thresholds from the stream's nominal frame rate.
    ///
    /// An undetermined frame rate (zero, negative or NaN) yields a zero
    /// jitter threshold, so every positive gap is reported as lag.
    pub fn from_fps(frames_per_second: f64, options: &AnalysisOptions) -> Self {
        let expected_delta_ms = if frames_per_second > 0.0 {
            1000.0 / frames_per_second
        } else {
            0.0
        };

        Self {
            expected_delta_ms,
            jitter_threshold_ms: expected_delta_ms * options.jitter_multiplier,
            freeze_similarity_cutoff: options.freeze_similarity_cutoff,
        }
    }

    /// Classify a frame from its gap and similarity to the previous frame.
    ///
    /// Frame 0 is always [`FrameStatus::Normal`].
    pub fn classify(&self, frame_index: u64, gap_ms: f64, similarity: f64) -> FrameStatus {
        if frame_index == 0 {
            FrameStatus::Normal
        } else if gap_ms > self.jitter_threshold_ms {
            FrameStatus::FrameDropOrLag
        } else if similarity > self.freeze_similarity_cutoff {
            FrameStatus::FrozenOrMerge
        } else {
            FrameStatus::Normal
        }
    }
}
