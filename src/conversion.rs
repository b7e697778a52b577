//! Internal conversion helpers.
//!
//! Pixel-data copying and timestamp conversion shared by the FFmpeg-backed
//! source, sink and transcoder.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp);
/// the result can be passed directly to [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Copy a tightly-packed buffer into the first plane of an FFmpeg frame,
/// honouring the frame's stride.
pub(crate) fn buffer_to_frame(
    buffer: &[u8],
    video_frame: &mut VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) {
    let stride = video_frame.stride(0);
    let row_len = (width as usize) * bytes_per_pixel;
    let data = video_frame.data_mut(0);
    for row in 0..(height as usize) {
        let src_start = row * row_len;
        let dst_start = row * stride;
        data[dst_start..dst_start + row_len]
            .copy_from_slice(&buffer[src_start..src_start + row_len]);
    }
}

/// Rescale a PTS value from the stream time base to milliseconds.
pub(crate) fn pts_to_millis(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * 1000.0 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Largest numerator or denominator an encoder time base may carry. MPEG-4
/// Part 2 stores the time base in 16 bits.
const MAX_RATIONAL_TERM: i64 = 65_535;

/// Approximate a frame rate as a rational whose terms both fit in 16 bits.
///
/// Walks the continued fraction of `frames_per_second` and keeps the last
/// convergent within bounds, then tries the best semiconvergent past it.
/// Exact rates such as `25`, `30000/1001` or `2997/100` come back exactly.
pub(crate) fn fps_to_rational(frames_per_second: f64) -> Rational {
    if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
        return Rational::new(0, 1);
    }
    if frames_per_second >= MAX_RATIONAL_TERM as f64 {
        return Rational::new(MAX_RATIONAL_TERM as i32, 1);
    }

    let (mut p0, mut q0) = (0_i64, 1_i64);
    let (mut p1, mut q1) = (1_i64, 0_i64);
    let mut remainder = frames_per_second;

    loop {
        let term = remainder.floor();
        let whole = term.min(MAX_RATIONAL_TERM as f64) as i64;
        let p2 = whole * p1 + p0;
        let q2 = whole * q1 + q0;

        if p2 > MAX_RATIONAL_TERM || q2 > MAX_RATIONAL_TERM {
            let limit = ((MAX_RATIONAL_TERM - p0) / p1.max(1))
                .min(if q1 > 0 { (MAX_RATIONAL_TERM - q0) / q1 } else { i64::MAX });
            if limit > 0 {
                let (ps, qs) = (limit * p1 + p0, limit * q1 + q0);
                let error = |p: i64, q: i64| (p as f64 / q as f64 - frames_per_second).abs();
                if error(ps, qs) < error(p1, q1) {
                    (p1, q1) = (ps, qs);
                }
            }
            break;
        }

        (p0, q0, p1, q1) = (p1, q1, p2, q2);
        let fraction = remainder - term;
        if fraction < 1e-9 {
            break;
        }
        remainder = 1.0 / fraction;
    }

    Rational::new(p1 as i32, q1 as i32)
}
