//! Playback clock tests over the scripted backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Script, ScriptedBackend, fast_options, wait_until};
use reelthread::{DecoderState, Playback, VideoDecoder};

const TIMEOUT: Duration = Duration::from_secs(5);

fn playback(script: Script) -> Playback<ScriptedBackend> {
    let decoder = VideoDecoder::new(script, fast_options());
    let mut playback = Playback::new(decoder);
    playback.start().expect("Failed to start scripted decoder");
    playback
}

fn current_time(playback: &Playback<ScriptedBackend>) -> Option<f64> {
    playback.current_frame().map(|frame| frame.time_ms)
}

#[test]
fn idle_playback_does_not_advance() {
    let mut playback = playback(Script::new(100));
    playback.update(Duration::from_millis(500));

    assert!(!playback.is_playing());
    assert_eq!(playback.position(), 0.0);
    assert!(playback.current_frame().is_none());
}

#[test]
fn length_matches_stream_duration() {
    let script = Script::new(100);
    let expected = script.duration_ms();
    let playback = playback(script);

    assert_eq!(playback.length(), expected);
}

#[test]
fn first_frame_is_shown_at_zero() {
    let mut playback = playback(Script::new(100));
    playback.play();

    let shown = wait_until(TIMEOUT, || {
        playback.update(Duration::ZERO);
        playback.current_frame().is_some()
    });
    assert!(shown);
    assert_eq!(current_time(&playback), Some(0.0));
    assert_eq!(playback.frames_processed(), 0);
}

#[test]
fn clock_advances_by_delta() {
    let mut playback = playback(Script::new(100));
    playback.play();

    playback.update(Duration::from_millis(16));
    playback.update(Duration::from_millis(16));
    assert!((playback.position() - 32.0).abs() < 1e-9);
}

#[test]
fn frames_never_run_ahead_of_the_clock() {
    let mut playback = playback(Script::new(100));
    playback.play();

    let mut last_shown = 0.0;
    for _ in 0..60 {
        playback.update(Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(2));

        if let Some(time) = current_time(&playback) {
            assert!(time <= playback.position());
            assert!(time >= last_shown);
            last_shown = time;
        }
    }

    assert!(last_shown > 0.0);
    assert!(playback.frames_processed() > 0);
}

#[test]
fn paused_playback_holds_position() {
    let mut playback = playback(Script::new(100));
    playback.play();
    playback.update(Duration::from_millis(100));

    playback.set_paused(true);
    assert!(playback.is_paused());
    playback.update(Duration::from_millis(500));
    assert!((playback.position() - 100.0).abs() < 1e-9);

    playback.set_paused(false);
    playback.update(Duration::from_millis(50));
    assert!((playback.position() - 150.0).abs() < 1e-9);
}

#[test]
fn stop_clears_the_displayed_frame() {
    let mut playback = playback(Script::new(100));
    playback.play();
    assert!(wait_until(TIMEOUT, || {
        playback.update(Duration::ZERO);
        playback.current_frame().is_some()
    }));

    playback.stop();
    assert!(!playback.is_playing());
    assert!(playback.current_frame().is_none());
    assert_eq!(playback.frames_processed(), 0);
}

#[test]
fn play_restarts_from_zero() {
    let mut playback = playback(Script::new(100));
    playback.play();
    playback.update(Duration::from_millis(300));

    playback.stop();
    playback.play();
    assert_eq!(playback.position(), 0.0);
    assert!(playback.is_playing());
}

#[test]
fn seek_moves_clock_and_decoder() {
    let script = Script::new(400);
    let record = Arc::clone(&script.record);
    let mut playback = playback(script);
    playback.play();

    playback.seek(3000.0);
    assert_eq!(playback.position(), 3000.0);

    let synced = wait_until(TIMEOUT, || {
        playback.update(Duration::ZERO);
        current_time(&playback) == Some(3000.0)
    });
    assert!(synced, "shown frame {:?}", current_time(&playback));
    assert!(record.lock().seeks.contains(&3000.0));
}

#[test]
fn drifting_clock_resynchronises_with_a_seek() {
    let script = Script::new(400);
    let record = Arc::clone(&script.record);
    let mut playback = playback(script);
    playback.play();

    // Let some early frames buffer, then jump the clock far past them.
    assert!(wait_until(TIMEOUT, || {
        playback.update(Duration::ZERO);
        playback.current_frame().is_some()
    }));
    playback.update(Duration::from_secs(10));

    let synced = wait_until(TIMEOUT, || {
        playback.update(Duration::ZERO);
        current_time(&playback) == Some(10_000.0)
    });
    assert!(synced, "shown frame {:?}", current_time(&playback));
    assert!(record.lock().seeks.contains(&10_000.0));
}

#[test]
fn finished_stream_is_not_buffering() {
    let script = Script::new(10);
    let last = script.last_frame_ms();
    let mut playback = playback(script);
    playback.play();

    let finished = wait_until(TIMEOUT, || {
        playback.update(Duration::from_millis(20));
        current_time(&playback) == Some(last)
            && playback.decoder().decoder_state() == DecoderState::EndOfStream
    });
    assert!(finished, "shown frame {:?}", current_time(&playback));

    playback.update(Duration::from_millis(20));
    assert!(!playback.is_buffering());
    assert_eq!(current_time(&playback), Some(last));
}
