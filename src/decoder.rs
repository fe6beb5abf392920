//! The background decode engine.
//!
//! [`VideoDecoder`] owns one decode thread. The thread pulls packets from a
//! [`MediaBackend`], feeds the active codec session, converts finished
//! frames to the display layout and hands them over through a small output
//! queue. The consumer drains that queue from its own loop, polls the
//! decoder state, and requests seeks; requests are queued as commands and
//! executed on the decode thread between units of work.
//!
//! # Example
//!
//! ```no_run
//! use reelthread::{DecoderOptions, VideoDecoder};
//!
//! let mut decoder = VideoDecoder::open("input.mp4", DecoderOptions::new())?;
//! decoder.start()?;
//!
//! while let Some(frames) = decoder.poll_decoded_frames() {
//!     for frame in frames {
//!         println!("{:.0} ms: {}x{}", frame.time_ms, frame.image.width(), frame.image.height());
//!         decoder.return_frame(frame);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(5));
//! }
//! # Ok::<(), reelthread::ReelError>(())
//! ```

use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::MediaBackend;
use crate::byte_source::{ByteSource, ReaderSource};
use crate::command::{CommandQueue, CommandSender};
use crate::config::DecoderOptions;
use crate::error::{LibraryError, ReelError};
use crate::ffmpeg::FfmpegBackend;
use crate::frame::DisplayableFrame;
use crate::hardware::HardwarePolicy;
use crate::queue::{OutputQueue, WorkSignal};
use crate::timing::frame_time_ms;

/// Lifecycle of the decode thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DecoderState {
    /// Idle and ready to pull more input.
    Ready = 0,
    /// Actively producing frames.
    Running = 1,
    /// Input exhausted and not looping. Only a seek leaves this state.
    EndOfStream = 2,
    /// Setup or session rebuild failed. Terminal.
    Faulted = 3,
    /// The decode thread exited cleanly. Terminal.
    Stopped = 4,
}

impl DecoderState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DecoderState::Ready,
            1 => DecoderState::Running,
            2 => DecoderState::EndOfStream,
            3 => DecoderState::Faulted,
            _ => DecoderState::Stopped,
        }
    }

    /// Whether the decode thread can never produce another frame.
    pub fn is_terminal(self) -> bool {
        matches!(self, DecoderState::Faulted | DecoderState::Stopped)
    }
}

/// State shared between the decode thread and the consumer.
#[derive(Debug)]
struct Shared {
    output: OutputQueue,
    signal: WorkSignal,
    state: AtomicU8,
    last_decoded_ms: AtomicU64,
    duration_ms: AtomicU64,
    abort: AtomicBool,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            output: OutputQueue::new(capacity),
            signal: WorkSignal::new(capacity),
            state: AtomicU8::new(DecoderState::Ready as u8),
            last_decoded_ms: AtomicU64::new(0f64.to_bits()),
            duration_ms: AtomicU64::new(0f64.to_bits()),
            abort: AtomicBool::new(false),
        }
    }

    fn state(&self) -> DecoderState {
        DecoderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DecoderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn last_decoded_ms(&self) -> f64 {
        f64::from_bits(self.last_decoded_ms.load(Ordering::Acquire))
    }

    fn set_last_decoded_ms(&self, time_ms: f64) {
        self.last_decoded_ms.store(time_ms.to_bits(), Ordering::Release);
    }

    fn duration_ms(&self) -> f64 {
        f64::from_bits(self.duration_ms.load(Ordering::Acquire))
    }

    fn set_duration_ms(&self, duration_ms: f64) {
        self.duration_ms.store(duration_ms.to_bits(), Ordering::Release);
    }

    fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

/// Everything the decode thread owns.
struct DecodeWorker<B: MediaBackend> {
    backend: B,
    shared: Arc<Shared>,
    commands: CommandSender<DecodeWorker<B>>,
    policy: HardwarePolicy,
    pending_packet: Option<B::Packet>,
    skip_until_ms: Option<f64>,
    looping: bool,
    idle_backoff: Duration,
    end_of_stream_backoff: Duration,
}

impl<B: MediaBackend> DecodeWorker<B> {
    fn run(mut self, commands: CommandQueue<DecodeWorker<B>>) {
        log::debug!("Decode loop started");

        while !self.shared.is_aborted() {
            match self.shared.state() {
                DecoderState::Ready | DecoderState::Running => {
                    if self.shared.output.has_room() {
                        self.decode_next_frame();
                    } else {
                        self.shared.set_state(DecoderState::Ready);
                        self.shared.signal.wait_timeout(self.idle_backoff);
                    }
                }
                // Reading past the end is not free; only a seek moves us on.
                DecoderState::EndOfStream => thread::sleep(self.end_of_stream_backoff),
                DecoderState::Faulted | DecoderState::Stopped => break,
            }

            commands.flush(&mut self);
        }

        if self.shared.state() != DecoderState::Faulted {
            self.shared.set_state(DecoderState::Stopped);
        }
        log::debug!("Decode loop exited in state {:?}", self.shared.state());
    }

    /// One unit of work: read (or resubmit) one packet and drain whatever
    /// the session produces.
    fn decode_next_frame(&mut self) {
        let packet = match self.pending_packet.take() {
            Some(packet) => Ok(packet),
            None => self.backend.read_packet(),
        };

        match packet {
            Ok(packet) => {
                self.shared.set_state(DecoderState::Running);
                if self.backend.is_target_stream(&packet)
                    && self.send_packet(Some(&packet)) == Err(LibraryError::TryAgain)
                {
                    self.pending_packet = Some(packet);
                }
            }
            Err(LibraryError::EndOfStream) => {
                // Refused when already drained, e.g. after a failed rewind.
                if self.send_packet(None).is_err() {
                    log::debug!("End of input flush was not accepted");
                }
                if self.looping {
                    self.commands.push(Self::rewind);
                } else {
                    log::debug!("Reached end of stream");
                    self.shared.set_state(DecoderState::EndOfStream);
                }
            }
            Err(LibraryError::TryAgain) => {
                self.shared.set_state(DecoderState::Ready);
                thread::sleep(self.idle_backoff);
            }
            Err(error) => log::warn!("Failed to read packet: {error}"),
        }
    }

    fn send_packet(&mut self, packet: Option<&B::Packet>) -> Result<(), LibraryError> {
        let result = self.backend.send_packet(packet);
        match &result {
            Ok(()) | Err(LibraryError::TryAgain) => self.drain_frames(),
            Err(error) if error.is_benign() => log::debug!("Decoder already drained: {error}"),
            Err(error) => {
                log::warn!("Failed to send packet: {error}");
                self.try_disable_hardware(error);
            }
        }
        result
    }

    fn drain_frames(&mut self) {
        loop {
            let timestamp = match self.backend.receive_frame() {
                Ok(timestamp) => timestamp,
                Err(error) if error.is_benign() => break,
                Err(error) => {
                    log::warn!("Failed to receive frame: {error}");
                    self.try_disable_hardware(&error);
                    break;
                }
            };

            let info = self.backend.stream_info();
            let time_ms = frame_time_ms(
                timestamp.best_effort,
                timestamp.pts,
                info.start_time,
                info.time_base,
            )
            .unwrap_or_else(|| self.shared.last_decoded_ms());

            if self.skip_until_ms.is_some_and(|skip_until| time_ms < skip_until) {
                continue;
            }

            let frame = match self.backend.take_frame() {
                Ok(frame) => frame,
                Err(error) => {
                    log::warn!("Failed to transfer frame from hardware decoder: {error}");
                    self.try_disable_hardware(&error);
                    continue;
                }
            };

            self.shared.set_last_decoded_ms(time_ms);

            let Some(image) = self.backend.present(frame) else {
                continue;
            };
            self.shared.output.enqueue(DisplayableFrame { time_ms, image });
        }
    }

    fn try_disable_hardware(&mut self, error: &LibraryError) {
        if self
            .policy
            .on_failure(error, self.backend.session_uses_hardware())
        {
            self.commands.push(Self::rebuild_session);
        }
    }

    fn rebuild_session(&mut self) {
        let allowed = self.policy.requested_backends();
        match self.backend.open_session(allowed) {
            Ok(()) => log::info!("Rebuilt codec session"),
            Err(error) => {
                log::error!("Failed to rebuild codec session: {error}");
                self.shared.set_state(DecoderState::Faulted);
            }
        }
    }

    /// Loop back to the start. A source that cannot seek stays at its end.
    fn rewind(&mut self) {
        if !self.seek(0.0) && !self.shared.state().is_terminal() {
            log::warn!("Cannot loop an unseekable source; holding at end of stream");
            self.shared.set_state(DecoderState::EndOfStream);
        }
    }

    /// Returns `false` when the backend could not reposition.
    fn seek(&mut self, target_ms: f64) -> bool {
        log::debug!("Seeking to {target_ms:.0} ms");

        self.pending_packet = None;
        let moved = match self.backend.seek(target_ms) {
            Ok(()) => true,
            Err(error) => {
                log::warn!("Failed to seek to {target_ms:.0} ms: {error}");
                false
            }
        };
        self.skip_until_ms = Some(target_ms);

        if !self.shared.state().is_terminal() {
            self.shared.set_state(DecoderState::Ready);
        }
        moved
    }
}

/// Decodes one video stream on a background thread.
///
/// Nothing happens until [`start`](Self::start). Dropping the decoder stops
/// the thread and waits for it to exit before releasing the source and the
/// codec session.
pub struct VideoDecoder<B: MediaBackend = FfmpegBackend> {
    options: DecoderOptions,
    shared: Arc<Shared>,
    commands: Option<CommandQueue<DecodeWorker<B>>>,
    sender: CommandSender<DecodeWorker<B>>,
    source: Option<B::Source>,
    thread: Option<JoinHandle<()>>,
}

impl VideoDecoder<FfmpegBackend> {
    /// Decode from any [`ByteSource`].
    pub fn from_byte_source<S: ByteSource + 'static>(source: S, options: DecoderOptions) -> Self {
        Self::new(Box::new(source), options)
    }

    /// Decode a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::FileOpen`] if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, options: DecoderOptions) -> Result<Self, ReelError> {
        let path = path.as_ref();
        let source = ReaderSource::open(path).map_err(|error| ReelError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        log::debug!("Opened {} for decoding", path.display());
        Ok(Self::from_byte_source(source, options))
    }
}

impl<B: MediaBackend> VideoDecoder<B> {
    /// Create a decoder for `source`. Nothing is read until
    /// [`start`](Self::start).
    pub fn new(source: B::Source, options: DecoderOptions) -> Self {
        let commands = CommandQueue::new();
        let sender = commands.sender();
        Self {
            shared: Arc::new(Shared::new(options.queue_capacity())),
            options,
            commands: Some(commands),
            sender,
            source: Some(source),
            thread: None,
        }
    }

    /// Open the source, establish a codec session, and spawn the decode
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::AlreadyStarted`] on every call after the first,
    /// without touching the running decoder. Setup failures are returned
    /// and also leave the decoder in [`DecoderState::Faulted`].
    pub fn start(&mut self) -> Result<(), ReelError> {
        let (Some(source), Some(commands)) = (self.source.take(), self.commands.take()) else {
            return Err(ReelError::AlreadyStarted);
        };

        let result = self.spawn(source, commands);
        if let Err(error) = &result {
            log::error!("Failed to start video decoder: {error}");
            self.shared.set_state(DecoderState::Faulted);
        }
        result
    }

    fn spawn(
        &mut self,
        source: B::Source,
        commands: CommandQueue<DecodeWorker<B>>,
    ) -> Result<(), ReelError> {
        let mut backend = B::prepare(source, &self.options)?;
        self.shared.set_duration_ms(backend.stream_info().duration_ms);

        let policy = HardwarePolicy::new(self.options.hardware_backends());
        backend.open_session(policy.requested_backends())?;

        let worker = DecodeWorker {
            backend,
            shared: Arc::clone(&self.shared),
            commands: commands.sender(),
            policy,
            pending_packet: None,
            skip_until_ms: None,
            looping: self.options.looping(),
            idle_backoff: self.options.idle_backoff(),
            end_of_stream_backoff: self.options.end_of_stream_backoff(),
        };

        let handle = thread::Builder::new()
            .name(self.options.thread_name().to_string())
            .spawn(move || worker.run(commands))
            .map_err(|error| ReelError::ThreadSpawn(error.to_string()))?;

        self.shared.signal.post(self.options.queue_capacity());
        self.thread = Some(handle);
        Ok(())
    }

    /// Ask the decode thread to continue from `target_ms`.
    ///
    /// Asynchronous: the seek runs on the decode thread before its next unit
    /// of work. Frames earlier than `target_ms` still in the pipeline are
    /// discarded. This is also the only way out of
    /// [`DecoderState::EndOfStream`].
    pub fn seek(&self, target_ms: f64) {
        self.sender.push(move |worker: &mut DecodeWorker<B>| {
            worker.seek(target_ms);
        });
    }

    /// Take every completed frame, oldest first.
    pub fn take_decoded_frames(&self) -> Vec<DisplayableFrame> {
        self.shared.output.drain(&self.shared.signal)
    }

    /// Take completed frames, or `None` once the decoder has stopped
    /// producing and every frame it produced has been taken.
    ///
    /// The state is read before draining, so frames flushed just before the
    /// decoder reached [`DecoderState::EndOfStream`] are never missed. An
    /// empty batch means "nothing yet".
    pub fn poll_decoded_frames(&self) -> Option<Vec<DisplayableFrame>> {
        let state = self.shared.state();
        let frames = self.take_decoded_frames();
        if frames.is_empty() && (state == DecoderState::EndOfStream || state.is_terminal()) {
            return None;
        }
        Some(frames)
    }

    /// Hand a frame back once it is no longer displayed. Its buffers return
    /// to the decoder's pools.
    pub fn return_frame(&self, frame: DisplayableFrame) {
        drop(frame);
    }

    /// Hand several frames back at once.
    pub fn return_frames<I: IntoIterator<Item = DisplayableFrame>>(&self, frames: I) {
        frames.into_iter().for_each(drop);
    }

    /// Current state of the decode thread.
    pub fn decoder_state(&self) -> DecoderState {
        self.shared.state()
    }

    /// Presentation time of the most recently decoded frame, in
    /// milliseconds.
    pub fn last_decoded_frame_time(&self) -> f64 {
        self.shared.last_decoded_ms()
    }

    /// Stream duration in milliseconds, known once started.
    pub fn duration(&self) -> f64 {
        self.shared.duration_ms()
    }

    /// Whether the decode thread is producing frames right now.
    ///
    /// `false` while idle under backpressure, at end of stream, and once the
    /// thread has exited.
    pub fn is_running(&self) -> bool {
        self.shared.state() == DecoderState::Running
            && self
                .thread
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Options the decoder was created with.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }
}

impl<B: MediaBackend> Drop for VideoDecoder<B> {
    fn drop(&mut self) {
        self.shared.abort.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Decode thread panicked");
            }
        }
    }
}
