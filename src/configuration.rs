//! Analysis configuration.
//!
//! [`AnalysisOptions`] is a builder carrying the classification policy
//! (jitter multiplier, freeze cutoff), the resolution frames are reduced to
//! before similarity scoring, and progress reporting settings.
//!
//! # Example
//!
//! ```no_run
//! use framelag::{AnalysisOptions, Analyzer};
//!
//! // Tolerate up to twice the nominal frame interval, flag only near-exact
//! // repeats as frozen, and score at a higher resolution.
//! let options = AnalysisOptions::new()
//!     .with_jitter_multiplier(2.0)
//!     .with_freeze_similarity_cutoff(0.995)
//!     .with_scoring_resolution(640, 480);
//! let report = Analyzer::new(options).run("capture.mp4", "annotated.mp4")?;
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::FramelagError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Gap multiplier applied to the nominal frame interval before a frame is
/// flagged as dropped or delayed.
pub const DEFAULT_JITTER_MULTIPLIER: f64 = 1.3;

/// Similarity above which a frame is flagged as frozen or merged.
pub const DEFAULT_FREEZE_SIMILARITY_CUTOFF: f64 = 0.985;

/// Width frames are resized to before similarity scoring.
pub const DEFAULT_SCORING_WIDTH: u32 = 320;

/// Height frames are resized to before similarity scoring.
pub const DEFAULT_SCORING_HEIGHT: u32 = 240;

/// Smallest accepted scoring dimension (one structural-similarity window).
pub const MIN_SCORING_DIMENSION: u32 = 8;

/// Configuration for an analysis run.
///
/// All fields have defaults: 1.3× jitter
/// tolerance, 0.985 freeze cutoff, 320×240 scoring resolution, no progress
/// callback.
#[derive(Clone)]
pub struct AnalysisOptions {
    pub(crate) jitter_multiplier: f64,
    pub(crate) freeze_similarity_cutoff: f64,
    pub(crate) scoring_width: u32,
    pub(crate) scoring_height: u32,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) has_progress: bool,
    pub(crate) batch_size: u64,
}

impl Debug for AnalysisOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisOptions")
            .field("jitter_multiplier", &self.jitter_multiplier)
            .field("freeze_similarity_cutoff", &self.freeze_similarity_cutoff)
            .field("scoring_width", &self.scoring_width)
            .field("scoring_height", &self.scoring_height)
            .field("has_progress", &self.has_progress)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisOptions {
    /// Create options with the default policy.
    pub fn new() -> Self {
        Self {
            jitter_multiplier: DEFAULT_JITTER_MULTIPLIER,
            freeze_similarity_cutoff: DEFAULT_FREEZE_SIMILARITY_CUTOFF,
            scoring_width: DEFAULT_SCORING_WIDTH,
            scoring_height: DEFAULT_SCORING_HEIGHT,
            progress: Arc::new(NoOpProgress),
            has_progress: false,
            batch_size: 1,
        }
    }

    /// Scale the allowed inter-frame gap before a frame is flagged as lag.
    #[must_use]
    pub fn with_jitter_multiplier(mut self, multiplier: f64) -> Self {
        self.jitter_multiplier = multiplier;
        self
    }

    /// Minimum similarity for a frame to be flagged as frozen or merged.
    #[must_use]
    pub fn with_freeze_similarity_cutoff(mut self, cutoff: f64) -> Self {
        self.freeze_similarity_cutoff = cutoff;
        self
    }

    /// Resolution frames are reduced to before similarity scoring.
    ///
    /// Lower values are cheaper and less sensitive to sensor noise but can
    /// miss freezes confined to a small region of the picture.
    #[must_use]
    pub fn with_scoring_resolution(mut self, width: u32, height: u32) -> Self {
        self.scoring_width = width;
        self.scoring_height = height;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self.has_progress = true;
        self
    }

    /// Fire the progress callback every `size` frames. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured jitter multiplier.
    pub fn jitter_multiplier(&self) -> f64 {
        self.jitter_multiplier
    }

    /// The configured freeze cutoff.
    pub fn freeze_similarity_cutoff(&self) -> f64 {
        self.freeze_similarity_cutoff
    }

    /// The configured scoring resolution as `(width, height)`.
    pub fn scoring_resolution(&self) -> (u32, u32) {
        (self.scoring_width, self.scoring_height)
    }

    /// Check every option against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`FramelagError::InvalidOption`] naming the first offending
    /// option.
    pub fn validate(&self) -> Result<(), FramelagError> {
        if !self.jitter_multiplier.is_finite() || self.jitter_multiplier < 0.0 {
            return Err(FramelagError::InvalidOption {
                name: "jitter_multiplier",
                reason: format!(
                    "must be a finite, non-negative number (got {})",
                    self.jitter_multiplier
                ),
            });
        }

        if !self.freeze_similarity_cutoff.is_finite()
            || !(-1.0..=1.0).contains(&self.freeze_similarity_cutoff)
        {
            return Err(FramelagError::InvalidOption {
                name: "freeze_similarity_cutoff",
                reason: format!(
                    "must lie within [-1, 1] (got {})",
                    self.freeze_similarity_cutoff
                ),
            });
        }

        if self.scoring_width < MIN_SCORING_DIMENSION
            || self.scoring_height < MIN_SCORING_DIMENSION
        {
            return Err(FramelagError::InvalidOption {
                name: "scoring_resolution",
                reason: format!(
                    "each dimension must be at least {MIN_SCORING_DIMENSION} (got {}x{})",
                    self.scoring_width, self.scoring_height
                ),
            });
        }

        Ok(())
    }
}
