//! Status overlay rendering.
//!
//! [`TextOverlay`] burns a black label box into the top-left corner of each
//! frame, containing the frame timestamp and its status, e.g.
//! `01:05.123 | Frozen/Merge`. Text is color-coded by status: green for
//! normal frames, red for drops/lag and orange for frozen/merged frames.
//!
//! The label is set in DejaVu Sans Mono Bold, embedded in the binary.
//! Rendering is purely visual; it never touches the analysis report.

use std::sync::LazyLock;

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::classifier::FrameStatus;

/// Text color for [`FrameStatus::Normal`].
pub const NORMAL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Text color for [`FrameStatus::FrameDropOrLag`].
pub const LAG_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Text color for [`FrameStatus::FrozenOrMerge`].
pub const FROZEN_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
/// Fill color of the label box.
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const BOX_LEFT: i32 = 10;
const BOX_TOP: i32 = 10;
const BOX_WIDTH: u32 = 450;
const BOX_HEIGHT: u32 = 55;
const TEXT_LEFT: i32 = 20;
const TEXT_TOP: i32 = 31;
const TEXT_SCALE: f32 = 24.0;

const LABEL_FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono-Bold.ttf");

static LABEL_FONT: LazyLock<Option<FontRef<'static>>> = LazyLock::new(|| {
    FontRef::try_from_slice(LABEL_FONT_DATA)
        .inspect_err(|error| log::error!("Embedded label font is unreadable: {error}"))
        .ok()
});

/// Draws per-frame annotations onto decoded frames.
///
/// Implementations must leave the frame's dimensions and channel layout
/// unchanged.
pub trait OverlayRenderer: Send + Sync {
    /// Annotate `frame` in place.
    fn render(&self, frame: &mut RgbImage, timestamp_ms: f64, status: FrameStatus);
}

/// Leaves frames untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverlay;

impl OverlayRenderer for NoOverlay {
    fn render(&self, _frame: &mut RgbImage, _timestamp_ms: f64, _status: FrameStatus) {}
}

/// Timestamp and status label in a fixed box.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOverlay;

impl TextOverlay {
    /// Create the default overlay.
    pub fn new() -> Self {
        Self
    }

    /// The text drawn for a frame.
    pub fn label(timestamp_ms: f64, status: FrameStatus) -> String {
        format!("{} | {}", format_timestamp(timestamp_ms), status.label())
    }
}

impl OverlayRenderer for TextOverlay {
    fn render(&self, frame: &mut RgbImage, timestamp_ms: f64, status: FrameStatus) {
        draw_filled_rect_mut(
            frame,
            Rect::at(BOX_LEFT, BOX_TOP).of_size(BOX_WIDTH, BOX_HEIGHT),
            BOX_COLOR,
        );
        if let Some(font) = LABEL_FONT.as_ref() {
            draw_text_mut(
                frame,
                status_color(status),
                TEXT_LEFT,
                TEXT_TOP,
                PxScale::from(TEXT_SCALE),
                font,
                &Self::label(timestamp_ms, status),
            );
        }
    }
}

/// The text color used for a status.
pub fn status_color(status: FrameStatus) -> Rgb<u8> {
    match status {
        FrameStatus::Normal => NORMAL_COLOR,
        FrameStatus::FrameDropOrLag => LAG_COLOR,
        FrameStatus::FrozenOrMerge => FROZEN_COLOR,
    }
}

/// Format milliseconds as `MM:SS.mmm`.
///
/// Every component is floored, never rounded. Minutes widen past two digits
/// for recordings longer than 99 minutes; negative input is treated as zero.
///
/// ```
/// assert_eq!(framelag::format_timestamp(65123.0), "01:05.123");
/// assert_eq!(framelag::format_timestamp(999.9), "00:00.999");
/// ```
pub fn format_timestamp(timestamp_ms: f64) -> String {
    let total = timestamp_ms.max(0.0).floor() as u64;
    let minutes = total / 60_000;
    let seconds = (total % 60_000) / 1_000;
    let millis = total % 1_000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}
