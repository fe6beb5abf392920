//! OutputQueue and WorkSignal tests.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reelthread::{DisplayableFrame, FrameImage, OutputQueue, PixelFormat, Pooled, WorkSignal};

fn frame(time_ms: f64) -> DisplayableFrame {
    DisplayableFrame {
        time_ms,
        image: FrameImage::new(1, 1, PixelFormat::Gray8, Pooled::detached(vec![0])),
    }
}

// ── OutputQueue ────────────────────────────────────────────────────

#[test]
fn queue_reports_room_below_capacity() {
    let queue = OutputQueue::new(2);
    assert!(queue.has_room());

    queue.enqueue(frame(0.0));
    assert!(queue.has_room());

    queue.enqueue(frame(40.0));
    assert!(!queue.has_room());
    assert_eq!(queue.len(), 2);
}

#[test]
fn queue_accepts_frames_past_capacity() {
    let queue = OutputQueue::new(1);
    queue.enqueue(frame(0.0));
    queue.enqueue(frame(40.0));
    queue.enqueue(frame(80.0));

    assert_eq!(queue.len(), 3);
    assert!(!queue.has_room());
}

#[test]
fn capacity_is_at_least_one() {
    assert_eq!(OutputQueue::new(0).capacity(), 1);
}

#[test]
fn drain_returns_frames_oldest_first() {
    let queue = OutputQueue::new(4);
    let signal = WorkSignal::new(4);
    for time in [0.0, 40.0, 80.0] {
        queue.enqueue(frame(time));
    }

    let times: Vec<_> = queue.drain(&signal).iter().map(|f| f.time_ms).collect();
    assert_eq!(times, vec![0.0, 40.0, 80.0]);
    assert!(queue.is_empty());
}

#[test]
fn drain_posts_one_permit_per_frame() {
    let queue = OutputQueue::new(4);
    let signal = WorkSignal::new(4);
    queue.enqueue(frame(0.0));
    queue.enqueue(frame(40.0));

    queue.drain(&signal);
    assert_eq!(signal.available(), 2);

    // An empty drain posts nothing.
    queue.drain(&signal);
    assert_eq!(signal.available(), 2);
}

// ── WorkSignal ─────────────────────────────────────────────────────

#[test]
fn permits_are_capped_at_ceiling() {
    let signal = WorkSignal::new(2);
    signal.post(5);
    assert_eq!(signal.available(), 2);
}

#[test]
fn wait_consumes_a_permit() {
    let signal = WorkSignal::new(2);
    signal.post(1);

    assert!(signal.wait_timeout(Duration::from_millis(10)));
    assert_eq!(signal.available(), 0);
}

#[test]
fn wait_times_out_without_permits() {
    let signal = WorkSignal::new(2);
    let started = Instant::now();

    assert!(!signal.wait_timeout(Duration::from_millis(20)));
    assert!(started.elapsed() >= Duration::from_millis(15));
}

#[test]
fn post_wakes_a_waiter() {
    let signal = Arc::new(WorkSignal::new(1));
    let waiter = {
        let signal = Arc::clone(&signal);
        thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    signal.post(1);

    assert!(waiter.join().expect("waiter panicked"));
}
