//! Hand-off between the decode thread and the consumer.
//!
//! [`OutputQueue`] holds completed frames until the consumer drains them.
//! [`WorkSignal`] is a counting signal the decode loop waits on while the
//! queue is full; every frame the consumer drains posts one permit. The
//! signal only paces work. A lost or extra permit changes throughput, never
//! correctness, since the loop re-checks [`OutputQueue::has_room`] itself.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::frame::DisplayableFrame;

/// Counting signal with a ceiling.
#[derive(Debug)]
pub struct WorkSignal {
    permits: Mutex<usize>,
    ready: Condvar,
    ceiling: usize,
}

impl WorkSignal {
    /// Create a signal holding no permits. Posting never raises the count
    /// above `ceiling`.
    pub fn new(ceiling: usize) -> Self {
        Self {
            permits: Mutex::new(0),
            ready: Condvar::new(),
            ceiling: ceiling.max(1),
        }
    }

    /// Add `count` permits and wake waiters.
    pub fn post(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits = (*permits + count).min(self.ceiling);
        self.ready.notify_all();
    }

    /// Consume one permit, waiting at most `timeout` for one to arrive.
    ///
    /// Returns `true` if a permit was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            let _ = self.ready.wait_for(&mut permits, timeout);
        }
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

/// Completed frames waiting for the consumer, oldest first.
#[derive(Debug)]
pub struct OutputQueue {
    frames: Mutex<Vec<DisplayableFrame>>,
    capacity: usize,
}

impl OutputQueue {
    /// Create an empty queue that reports room while it holds fewer than
    /// `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(Vec::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Append a completed frame.
    pub fn enqueue(&self, frame: DisplayableFrame) {
        self.frames.lock().push(frame);
    }

    /// Take every queued frame, posting one permit to `signal` per frame.
    pub fn drain(&self, signal: &WorkSignal) -> Vec<DisplayableFrame> {
        let frames = std::mem::take(&mut *self.frames.lock());
        signal.post(frames.len());
        frames
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the decode loop may produce another frame.
    pub fn has_room(&self) -> bool {
        self.len() < self.capacity
    }

    /// Queue length at which the decode loop stops producing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
