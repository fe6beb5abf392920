//! Timestamp conversions and packed pixel copies.
//!
//! Helpers shared by the FFmpeg backend and the decode loop that do not
//! belong in any single public module.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Presentation time of a frame in milliseconds from stream start.
///
/// Prefers the best-effort timestamp and falls back to the raw PTS.
/// Returns `None` when neither is set.
pub fn frame_time_ms(
    best_effort: Option<i64>,
    pts: Option<i64>,
    start_time: i64,
    time_base: Rational,
) -> Option<f64> {
    let timestamp = best_effort.or(pts)?;
    Some(stream_timestamp_to_ms(timestamp - start_time, time_base))
}

/// Rescale a timestamp in the stream's time base to milliseconds.
pub fn stream_timestamp_to_ms(timestamp: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    timestamp as f64 * f64::from(time_base.numerator()) * 1000.0
        / f64::from(time_base.denominator())
}

/// Rescale milliseconds to a timestamp in the stream's time base.
///
/// The result is suitable for passing to FFmpeg seeking functions.
pub fn ms_to_stream_timestamp(ms: f64, time_base: Rational) -> i64 {
    if time_base.numerator() == 0 {
        return 0;
    }
    (ms / 1000.0 * f64::from(time_base.denominator()) / f64::from(time_base.numerator())) as i64
}

/// Copy plane 0 of `frame` into `buffer` as tightly packed rows of
/// `row_bytes`, reusing the buffer's allocation.
///
/// FFmpeg frames frequently carry per-row padding (stride > row width).
/// The padding is stripped so the buffer can be uploaded or handed to
/// [`image`] directly.
pub fn copy_packed_rows(frame: &VideoFrame, row_bytes: usize, buffer: &mut Vec<u8>) {
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let data = frame.data(0);

    buffer.clear();
    if stride == row_bytes {
        buffer.extend_from_slice(&data[..row_bytes * height]);
    } else {
        buffer.reserve(row_bytes * height);
        for row in 0..height {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
    }
}
