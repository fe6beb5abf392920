//! End-to-end decoding through FFmpeg.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`
//! and skip themselves when the fixture is missing.

mod common;

use std::fs::File;
use std::io::Cursor;
use std::time::Duration;

use common::{fixture_available, sample_video_path, wait_until};
use reelthread::{
    DecoderOptions, DecoderProbe, DecoderState, HardwareBackends, PixelFormat, Playback,
    ReaderSource, ReelError, VideoDecoder,
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn decode_frames(decoder: &VideoDecoder, count: usize) -> Vec<f64> {
    let mut times = Vec::new();
    wait_until(TIMEOUT, || {
        let batch = decoder.take_decoded_frames();
        times.extend(batch.iter().map(|frame| frame.time_ms));
        decoder.return_frames(batch);
        times.len() >= count
            || matches!(
                decoder.decoder_state(),
                DecoderState::EndOfStream | DecoderState::Faulted | DecoderState::Stopped
            )
    });
    times
}

// ── Source errors ──────────────────────────────────────────────────

#[test]
fn garbage_source_faults_on_start() {
    let source = ReaderSource::new(Cursor::new(b"this is not a media file".to_vec()))
        .expect("Failed to wrap cursor");
    let mut decoder = VideoDecoder::from_byte_source(source, DecoderOptions::new());

    let result = decoder.start();
    assert!(matches!(
        result,
        Err(ReelError::SourceOpen(_) | ReelError::StreamInfo(_) | ReelError::NoVideoStream)
    ));
    assert_eq!(decoder.decoder_state(), DecoderState::Faulted);
}

// ── Decoding ───────────────────────────────────────────────────────

#[test]
fn software_decode_produces_ordered_frames() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let mut decoder = VideoDecoder::open(path, DecoderOptions::new().with_software_only())
        .expect("Failed to open fixture");
    decoder.start().expect("Failed to start decoder");
    assert!(decoder.duration() > 0.0);

    let times = decode_frames(&decoder, 10);
    assert!(times.len() >= 10);
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn frames_have_requested_layout() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let options = DecoderOptions::new()
        .with_software_only()
        .with_pixel_format(PixelFormat::Rgb8);
    let mut decoder = VideoDecoder::open(path, options).expect("Failed to open fixture");
    decoder.start().expect("Failed to start decoder");

    let mut frame = None;
    wait_until(TIMEOUT, || {
        frame = decoder.take_decoded_frames().into_iter().next();
        frame.is_some()
    });
    let frame = frame.expect("No frame decoded");

    assert_eq!(frame.image.format(), PixelFormat::Rgb8);
    assert_eq!(
        frame.image.data().len(),
        PixelFormat::Rgb8.row_bytes(frame.image.width()) * frame.image.height() as usize
    );
    let image = frame.image.to_dynamic_image().expect("Failed to convert frame");
    assert_eq!(image.width(), frame.image.width());
}

#[test]
fn default_backends_decode() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    // Hardware if the machine has it, software otherwise.
    let mut decoder = VideoDecoder::open(path, DecoderOptions::new()).expect("Failed to open fixture");
    decoder.start().expect("Failed to start decoder");

    let times = decode_frames(&decoder, 5);
    assert!(!times.is_empty());
    assert_ne!(decoder.decoder_state(), DecoderState::Faulted);
}

#[test]
fn decode_from_file_byte_source() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let file = File::open(path).expect("Failed to open fixture");
    let source = ReaderSource::new(file).expect("Failed to wrap file");
    let mut decoder = VideoDecoder::from_byte_source(
        source,
        DecoderOptions::new().with_software_only().with_io_buffer_size(1024),
    );
    decoder.start().expect("Failed to start decoder");

    assert!(!decode_frames(&decoder, 3).is_empty());
}

#[test]
fn decode_reaches_end_of_stream() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let mut decoder = VideoDecoder::open(path, DecoderOptions::new().with_software_only())
        .expect("Failed to open fixture");
    decoder.start().expect("Failed to start decoder");

    let finished = wait_until(TIMEOUT, || {
        decoder.return_frames(decoder.take_decoded_frames());
        decoder.decoder_state() == DecoderState::EndOfStream
    });
    assert!(finished);
    assert!(decoder.last_decoded_frame_time() > 0.0);
    assert!(decoder.last_decoded_frame_time() <= decoder.duration());
}

#[test]
fn seek_skips_earlier_frames() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let mut decoder = VideoDecoder::open(path, DecoderOptions::new().with_software_only())
        .expect("Failed to open fixture");
    decoder.start().expect("Failed to start decoder");

    let target = decoder.duration() / 2.0;
    decoder.seek(target);

    // Drop whatever was queued before the seek ran.
    let mut times = Vec::new();
    wait_until(TIMEOUT, || {
        let batch = decoder.take_decoded_frames();
        times.extend(
            batch
                .iter()
                .map(|frame| frame.time_ms)
                .filter(|&time| time >= target),
        );
        decoder.return_frames(batch);
        !times.is_empty()
    });

    assert!(!times.is_empty());
    assert!(times[0] >= target);
    assert!(times[0] - target < 1000.0);
}

#[test]
fn looping_playback_keeps_running() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let decoder = VideoDecoder::open(
        path,
        DecoderOptions::new().with_software_only().with_looping(true),
    )
    .expect("Failed to open fixture");
    let mut playback = Playback::new(decoder);
    playback.start().expect("Failed to start decoder");
    playback.play();

    let shown = wait_until(TIMEOUT, || {
        playback.update(Duration::from_millis(16));
        playback.current_frame().is_some()
    });
    assert!(shown);
    assert!(!playback.decoder().decoder_state().is_terminal());
}

// ── Probing ────────────────────────────────────────────────────────

#[test]
fn probe_reports_stream_and_candidates() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let report = DecoderProbe::probe(path, HardwareBackends::ALL).expect("Failed to probe");
    assert!(report.width > 0 && report.height > 0);
    assert!(report.duration_ms > 0.0);

    let last = report.candidates.last().expect("No candidates");
    assert!(last.device.is_none());

    let json = report.to_json();
    assert_eq!(json["codec"], report.codec.as_str());
}

#[test]
fn probe_software_only_lists_one_candidate() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let report = DecoderProbe::probe(path, HardwareBackends::NONE).expect("Failed to probe");
    assert_eq!(report.candidates.len(), 1);
    assert!(report.candidates[0].device.is_none());
}

#[test]
fn probe_many_reports_per_file() {
    let path = sample_video_path();
    if !fixture_available(path) {
        return;
    }

    let results = DecoderProbe::probe_many(
        &[path, "tests/fixtures/does_not_exist.mp4"],
        HardwareBackends::NONE,
    );
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ReelError::FileOpen { .. })));
}

#[test]
fn hardware_device_listing_is_consistent() {
    for device in reelthread::available_hardware_devices() {
        assert!(!device.name().is_empty());
        assert_eq!(device.to_string(), device.name());
    }
}
