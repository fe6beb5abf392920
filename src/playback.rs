//! A playback clock driving a [`VideoDecoder`] from a render loop.
//!
//! [`Playback`] advances a playback position by the frame delta it is given,
//! promotes decoded frames whose time has come, hands displayed frames back
//! to the decoder, and re-synchronises the decoder with a seek when the
//! buffered frames drift too far from the clock.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use reelthread::{DecoderOptions, Playback, VideoDecoder};
//!
//! let decoder = VideoDecoder::open("input.mp4", DecoderOptions::new().with_looping(true))?;
//! let mut playback = Playback::new(decoder);
//! playback.start()?;
//! playback.play();
//!
//! loop {
//!     playback.update(Duration::from_millis(16));
//!     if let Some(frame) = playback.current_frame() {
//!         // Upload `frame.image` to a texture.
//!         let _ = frame.time_ms;
//!     }
//! #   break;
//! }
//! # Ok::<(), reelthread::ReelError>(())
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use crate::backend::MediaBackend;
use crate::decoder::{DecoderState, VideoDecoder};
use crate::error::ReelError;
use crate::ffmpeg::FfmpegBackend;
use crate::frame::DisplayableFrame;

/// How far buffered frames may drift from the clock, in milliseconds,
/// before the decoder is re-synchronised with a seek.
pub const SYNC_LENIENCE_MS: f64 = 2500.0;

/// Consumer-side playback state for one decoder.
pub struct Playback<B: MediaBackend = FfmpegBackend> {
    decoder: VideoDecoder<B>,
    available: VecDeque<DisplayableFrame>,
    current: Option<DisplayableFrame>,
    position_ms: f64,
    playing: bool,
    paused: bool,
    looping: bool,
    buffering: bool,
    frames_processed: u64,
}

impl<B: MediaBackend> Playback<B> {
    /// Wrap `decoder`. Looping follows the decoder's options.
    pub fn new(decoder: VideoDecoder<B>) -> Self {
        let looping = decoder.options().looping();
        Self {
            decoder,
            available: VecDeque::new(),
            current: None,
            position_ms: 0.0,
            playing: false,
            paused: false,
            looping,
            buffering: false,
            frames_processed: 0,
        }
    }

    /// Start the underlying decoder.
    ///
    /// # Errors
    ///
    /// See [`VideoDecoder::start`].
    pub fn start(&mut self) -> Result<(), ReelError> {
        self.decoder.start()
    }

    /// Start playing from the beginning. Restarts if already playing.
    pub fn play(&mut self) {
        if self.playing {
            self.stop();
        } else {
            self.position_ms = 0.0;
        }
        self.playing = true;
    }

    /// Stop playing, drop the displayed frame, and rewind the decoder.
    pub fn stop(&mut self) {
        if self.playing {
            self.clear();
            self.seek(0.0);
        }
        self.playing = false;
    }

    /// Freeze or resume the clock without dropping the displayed frame.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether the clock is frozen.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether [`play`](Self::play) was called since the last stop.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Jump the clock to `position_ms` and re-synchronise the decoder.
    pub fn seek(&mut self, position_ms: f64) {
        self.position_ms = position_ms;
        self.seek_into_sync();
    }

    /// Stream length in milliseconds.
    pub fn length(&self) -> f64 {
        self.decoder.duration()
    }

    /// Playback position in milliseconds.
    pub fn position(&self) -> f64 {
        self.position_ms
    }

    /// The frame that should be on screen now.
    pub fn current_frame(&self) -> Option<&DisplayableFrame> {
        self.current.as_ref()
    }

    /// Whether playback is waiting on the decoder.
    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Number of updates that changed the displayed frame.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// The decoder being driven.
    pub fn decoder(&self) -> &VideoDecoder<B> {
        &self.decoder
    }

    /// Advance the clock by `delta` and update the displayed frame.
    pub fn update(&mut self, delta: Duration) {
        if self.paused || !self.playing {
            return;
        }
        self.position_ms += delta.as_secs_f64() * 1000.0;

        // At the end of the stream, moving back into decoded territory needs
        // a seek to get the decoder going again.
        if self.decoder.decoder_state() == DecoderState::EndOfStream
            && self.available.is_empty()
            && self.position_ms < self.decoder.last_decoded_frame_time()
        {
            self.seek_into_sync();
        }

        if let Some(next) = self.available.front() {
            if self.is_out_of_sync(next.time_ms) {
                log::info!(
                    "Video too far out of sync ({:.2}), seeking to {:.2}",
                    next.time_ms,
                    self.position_ms
                );
                self.seek_into_sync();
            }
        }

        let displayed_time = self.current_frame_time();

        while self
            .available
            .front()
            .is_some_and(|next| self.is_due(next.time_ms))
        {
            let Some(next) = self.available.pop_front() else {
                break;
            };
            if let Some(previous) = self.current.replace(next) {
                self.decoder.return_frame(previous);
            }
        }

        if self.available.is_empty() {
            self.available.extend(self.decoder.take_decoded_frames());
        }

        self.buffering = self.decoder.is_running() && self.available.is_empty();

        if displayed_time != self.current_frame_time() {
            self.frames_processed += 1;
        }
    }

    fn current_frame_time(&self) -> f64 {
        self.current.as_ref().map_or(0.0, |frame| frame.time_ms)
    }

    fn is_out_of_sync(&self, frame_ms: f64) -> bool {
        let drift = |position: f64| (position - frame_ms).abs() > SYNC_LENIENCE_MS;
        let mut out_of_sync = drift(self.position_ms);
        if self.looping {
            let duration = self.decoder.duration();
            out_of_sync &= drift(self.position_ms - duration) && drift(self.position_ms + duration);
        }
        out_of_sync
    }

    fn is_due(&self, frame_ms: f64) -> bool {
        // Frames left over from the end of the previous loop keep playing
        // while the rewind catches up.
        if self.looping
            && ((frame_ms - self.decoder.duration()) - self.position_ms).abs() < SYNC_LENIENCE_MS
        {
            return true;
        }
        frame_ms <= self.position_ms && (frame_ms - self.position_ms).abs() < SYNC_LENIENCE_MS
    }

    fn seek_into_sync(&mut self) {
        self.decoder.seek(self.position_ms);
        self.decoder.return_frames(self.available.drain(..));
    }

    fn clear(&mut self) {
        self.current = None;
        self.available.clear();
        self.frames_processed = 0;
        self.playing = false;
    }
}
