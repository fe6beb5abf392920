//! # reelthread
//!
//! Background video decoding for render loops.
//!
//! `reelthread` decodes one video stream on a dedicated thread, picking the
//! best hardware decoder the linked FFmpeg offers and falling back to
//! software for good when a hardware path fails mid-stream. Finished frames
//! are converted to a display layout and handed over through a small
//! bounded queue; their buffers are recycled when the consumer is done with
//! them. Powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Decode Frames
//!
//! ```no_run
//! use reelthread::{DecoderOptions, VideoDecoder};
//!
//! let mut decoder = VideoDecoder::open("input.mp4", DecoderOptions::new())?;
//! decoder.start()?;
//!
//! for frame in decoder.take_decoded_frames() {
//!     frame.image.to_dynamic_image()?.save(format!("frame_{:.0}.png", frame.time_ms))?;
//!     decoder.return_frame(frame);
//! }
//! # Ok::<(), reelthread::ReelError>(())
//! ```
//!
//! ### Drive Playback From a Render Loop
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
//! playback.update(Duration::from_millis(16));
//! # Ok::<(), reelthread::ReelError>(())
//! ```
//!
//! ### Restrict Hardware Backends
//!
//! ```no_run
//! use reelthread::{DecoderOptions, HardwareBackend, HardwareBackends, VideoDecoder};
//!
//! let options = DecoderOptions::new()
//!     .with_hardware_backends(HardwareBackends::NONE.with(HardwareBackend::Vaapi));
//! let mut decoder = VideoDecoder::open("input.mkv", options)?;
//! decoder.start()?;
//! # Ok::<(), reelthread::ReelError>(())
//! ```
//!
//! ## Features
//!
//! - **Decoder selection**: hardware candidates ranked by backend, software
//!   always available as the last resort
//! - **Hardware fallback**: the first hardware failure rebuilds the session
//!   in software; out-of-memory failures rule hardware out entirely
//! - **Backpressure**: at most a few frames are decoded ahead of the consumer
//! - **Buffer reuse**: transfer, conversion and payload buffers are pooled
//! - **Thread-safe seeking**: seeks are queued and run on the decode thread
//! - **Custom sources**: decode from any [`ByteSource`], not just files
//! - **Playback clock**: [`Playback`] keeps frames in step with a render loop
//! - **Probing**: [`DecoderProbe`] shows what the selector would try
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod backend;
pub mod byte_source;
pub mod command;
pub mod config;
pub mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod hardware;
pub mod playback;
pub mod pool;
pub mod probe;
pub mod queue;
pub mod selector;
pub mod timing;

pub use backend::{FrameTimestamp, MediaBackend, StreamInfo};
pub use byte_source::{ByteSource, ReaderSource};
pub use command::{CommandQueue, CommandSender};
pub use config::{DecoderOptions, PixelFormat};
pub use decoder::{DecoderState, VideoDecoder};
pub use error::{LibraryError, ReelError};
pub use ffmpeg::{FfmpegBackend, FfmpegLogLevel, ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame::{DisplayableFrame, FrameImage};
pub use hardware::{
    DeviceKind, HardwareBackend, HardwareBackends, HardwarePolicy, available_hardware_devices,
};
pub use playback::Playback;
pub use pool::{FramePool, PoolStats, Pooled};
pub use probe::{CandidateInfo, DecoderProbe, ProbeReport};
pub use queue::{OutputQueue, WorkSignal};
pub use selector::DecoderCandidate;

/// Re-exported so backends and tests can build [`StreamInfo`] without a
/// direct `ffmpeg-next` dependency.
pub use ffmpeg_next::Rational;
