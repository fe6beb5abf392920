//! The media library seam.
//!
//! [`MediaBackend`] is the narrow request/seek/decode interface the decode
//! loop drives. Every call is made from the decode thread. Results come back
//! as [`LibraryError`] codes that the loop interprets; none of them reach
//! the consumer.
//!
//! [`FfmpegBackend`](crate::FfmpegBackend) is the production backend.

use ffmpeg_next::Rational;

use crate::config::DecoderOptions;
use crate::error::{LibraryError, ReelError};
use crate::frame::FrameImage;
use crate::hardware::HardwareBackends;

/// Properties of the selected video stream, fixed once the source is open.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Index of the video stream within the container.
    pub index: usize,
    /// Time base of the stream's timestamps.
    pub time_base: Rational,
    /// Timestamp of the first frame, in the stream's time base.
    pub start_time: i64,
    /// Total duration in milliseconds.
    pub duration_ms: f64,
    /// Codec short name (e.g. `"h264"`).
    pub codec: String,
    /// Container short name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}

/// Timestamps of a frame the codec session has produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimestamp {
    /// The library's best-effort presentation timestamp.
    pub best_effort: Option<i64>,
    /// The raw presentation timestamp.
    pub pts: Option<i64>,
}

/// Demux and decode primitives for one open source.
///
/// A backend owns the stream handle, at most one codec session, and every
/// buffer pool used for transfer and conversion. It is moved onto the decode
/// thread and used only there.
pub trait MediaBackend: Sized + Send + 'static {
    /// The byte stream the backend reads from.
    type Source: Send + 'static;
    /// A compressed packet.
    type Packet: Send;
    /// A decoded frame resident in host memory.
    type Frame: Send;

    /// Open the source and locate the video stream.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be opened as media, stream discovery
    /// fails, or there is no video stream.
    fn prepare(source: Self::Source, options: &DecoderOptions) -> Result<Self, ReelError>;

    /// Properties of the selected video stream.
    fn stream_info(&self) -> &StreamInfo;

    /// Read the next packet from any stream.
    fn read_packet(&mut self) -> Result<Self::Packet, LibraryError>;

    /// Whether `packet` belongs to the selected video stream.
    fn is_target_stream(&self, packet: &Self::Packet) -> bool;

    /// Flush the codec session and reposition the demuxer at or before
    /// `target_ms`.
    fn seek(&mut self, target_ms: f64) -> Result<(), LibraryError>;

    /// Replace the codec session with the first candidate that opens under
    /// `allowed`.
    ///
    /// The previous session is released before any candidate is tried.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::NoDecoderAvailable`] if no candidate opens; the
    /// backend is then left without a session.
    fn open_session(&mut self, allowed: HardwareBackends) -> Result<(), ReelError>;

    /// Whether the active session decodes through a hardware device.
    fn session_uses_hardware(&self) -> bool;

    /// Submit a packet, or `None` to signal end of input.
    fn send_packet(&mut self, packet: Option<&Self::Packet>) -> Result<(), LibraryError>;

    /// Retrieve the next decoded frame into the session's working frame.
    fn receive_frame(&mut self) -> Result<FrameTimestamp, LibraryError>;

    /// Take the working frame into host memory, transferring it off the
    /// device if needed.
    fn take_frame(&mut self) -> Result<Self::Frame, LibraryError>;

    /// Convert a host frame to the display layout. `None` drops the frame.
    fn present(&mut self, frame: Self::Frame) -> Option<FrameImage>;
}
