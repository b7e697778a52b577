//! Overlay rendering and timestamp formatting.

use framelag::overlay::{BOX_COLOR, FROZEN_COLOR, LAG_COLOR, NORMAL_COLOR, status_color};
use framelag::{FrameStatus, NoOverlay, OverlayRenderer, TextOverlay, format_timestamp};
use image::{Rgb, RgbImage};

const GREY: Rgb<u8> = Rgb([128, 128, 128]);

/// Text is antialiased against the black box, so fully covered pixels can
/// land a step short of the exact color.
fn is_near(pixel: Rgb<u8>, color: Rgb<u8>) -> bool {
    pixel
        .0
        .iter()
        .zip(color.0)
        .all(|(&actual, expected)| actual.abs_diff(expected) <= 8)
}

fn text_pixels(frame: &RgbImage, color: Rgb<u8>) -> usize {
    let mut count = 0;
    for y in 10..65.min(frame.height()) {
        for x in 10..460.min(frame.width()) {
            if is_near(*frame.get_pixel(x, y), color) {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn timestamps_are_floored() {
    assert_eq!(format_timestamp(65_123.0), "01:05.123");
    assert_eq!(format_timestamp(0.0), "00:00.000");
    assert_eq!(format_timestamp(999.999), "00:00.999");
    assert_eq!(format_timestamp(59_999.9), "00:59.999");
    assert_eq!(format_timestamp(60_000.0), "01:00.000");
}

#[test]
fn long_recordings_widen_minutes() {
    assert_eq!(format_timestamp(6_000_000.0), "100:00.000");
}

#[test]
fn negative_timestamps_clamp_to_zero() {
    assert_eq!(format_timestamp(-12.0), "00:00.000");
}

#[test]
fn label_text() {
    assert_eq!(
        TextOverlay::label(65_123.0, FrameStatus::FrozenOrMerge),
        "01:05.123 | Frozen/Merge"
    );
    assert_eq!(
        TextOverlay::label(33.4, FrameStatus::FrameDropOrLag),
        "00:00.033 | Frame Drop/Lag"
    );
}

#[test]
fn colors_per_status() {
    assert_eq!(status_color(FrameStatus::Normal), NORMAL_COLOR);
    assert_eq!(status_color(FrameStatus::FrameDropOrLag), LAG_COLOR);
    assert_eq!(status_color(FrameStatus::FrozenOrMerge), FROZEN_COLOR);
    assert_eq!(NORMAL_COLOR, Rgb([0, 255, 0]));
    assert_eq!(LAG_COLOR, Rgb([255, 0, 0]));
    assert_eq!(FROZEN_COLOR, Rgb([255, 165, 0]));
}

#[test]
fn draws_box_and_text() {
    for status in [
        FrameStatus::Normal,
        FrameStatus::FrameDropOrLag,
        FrameStatus::FrozenOrMerge,
    ] {
        let mut frame = RgbImage::from_pixel(640, 360, GREY);
        TextOverlay::new().render(&mut frame, 1_234.0, status);

        assert_eq!(frame.dimensions(), (640, 360));
        // Box corners.
        assert_eq!(*frame.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*frame.get_pixel(459, 64), BOX_COLOR);
        // Just outside the box.
        assert_eq!(*frame.get_pixel(9, 10), GREY);
        assert_eq!(*frame.get_pixel(460, 64), GREY);
        assert_eq!(*frame.get_pixel(459, 65), GREY);
        // Label glyphs start at the text origin.
        assert!(text_pixels(&frame, status_color(status)) > 100);
        let origin_band = (31..60).any(|y| {
            (20..40).any(|x| is_near(*frame.get_pixel(x, y), status_color(status)))
        });
        assert!(origin_band);
        assert!(!(0..31).any(|y| is_near(*frame.get_pixel(25, y), status_color(status))));
        // Elsewhere untouched.
        assert_eq!(*frame.get_pixel(600, 300), GREY);
    }
}

#[test]
fn text_blends_only_status_color_into_box() {
    let mut frame = RgbImage::from_pixel(640, 360, GREY);
    TextOverlay::new().render(&mut frame, 65_123.0, FrameStatus::FrameDropOrLag);

    for y in 10..65 {
        for x in 10..460 {
            let Rgb([_, green, blue]) = *frame.get_pixel(x, y);
            assert_eq!((green, blue), (0, 0), "pixel ({x}, {y})");
        }
    }
    assert!(text_pixels(&frame, LAG_COLOR) > 100);
}

#[test]
fn longer_labels_draw_more_text() {
    let mut short = RgbImage::from_pixel(640, 360, GREY);
    TextOverlay::new().render(&mut short, 0.0, FrameStatus::Normal);
    let mut long = RgbImage::from_pixel(640, 360, GREY);
    TextOverlay::new().render(&mut long, 0.0, FrameStatus::FrozenOrMerge);

    // Both labels share "00:00.000 | "; the status word differs in length.
    let normal = text_pixels(&short, NORMAL_COLOR);
    let frozen = text_pixels(&long, FROZEN_COLOR);
    assert!(frozen > normal, "{frozen} <= {normal}");
}

#[test]
fn small_frames_are_clipped() {
    let mut frame = RgbImage::from_pixel(40, 20, GREY);
    TextOverlay::new().render(&mut frame, 0.0, FrameStatus::Normal);
    assert_eq!(frame.dimensions(), (40, 20));
    assert_eq!(*frame.get_pixel(39, 19), BOX_COLOR);
    assert_eq!(*frame.get_pixel(5, 5), GREY);
}

#[test]
fn tiny_frames_are_left_alone() {
    let mut frame = RgbImage::from_pixel(8, 8, GREY);
    TextOverlay::new().render(&mut frame, 0.0, FrameStatus::Normal);
    assert!(frame.pixels().all(|pixel| *pixel == GREY));
}

#[test]
fn no_overlay_is_a_no_op() {
    let original = RgbImage::from_fn(64, 64, |x, y| Rgb([x as u8, y as u8, 7]));
    let mut frame = original.clone();
    NoOverlay.render(&mut frame, 5_000.0, FrameStatus::FrameDropOrLag);
    assert_eq!(frame, original);
}
