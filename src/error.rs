//! Error types for the `reelthread` crate.
//!
//! Two error types live here. [`ReelError`] is returned from the few
//! calls that can fail across the consumer boundary: opening a source,
//! starting the decoder, probing a file. [`LibraryError`] is the
//! interpreted result code of a single demux/decode primitive; the decode
//! loop matches on it to decide between retrying, draining, falling back
//! to software, or giving up on a frame. It never reaches the consumer.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The error type for setup and consumer-facing operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReelError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path passed to [`VideoDecoder::open`](crate::VideoDecoder::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The byte source could not be opened as a media stream.
    #[error("Error opening file or stream: {0}")]
    SourceOpen(String),

    /// Stream discovery failed after the source was opened.
    #[error("Error finding stream info: {0}")]
    StreamInfo(String),

    /// The source does not contain a video stream.
    #[error("No video stream found in source")]
    NoVideoStream,

    /// None of the decoder candidates for the stream could be opened.
    #[error("No decoder could be opened for codec {codec}")]
    NoDecoderAvailable {
        /// Name of the codec that was being decoded.
        codec: String,
    },

    /// [`start`](crate::VideoDecoder::start) was called more than once.
    #[error("Cannot start decoding once already started")]
    AlreadyStarted,

    /// The decode thread could not be spawned.
    #[error("Failed to spawn decode thread: {0}")]
    ThreadSpawn(String),

    /// A frame payload does not match its declared dimensions.
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error from the byte source or the file system.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while converting or saving a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ReelError {
    fn from(error: FfmpegError) -> Self {
        ReelError::FfmpegError(error.to_string())
    }
}

/// Interpreted result code of a demux or decode primitive.
///
/// The library reports a handful of conditions that are not failures at
/// all (`TryAgain`, `EndOfStream`), one that changes the hardware policy
/// (`OutOfMemory`), and everything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// Transient backpressure: drain output or retry later.
    #[error("Resource temporarily unavailable")]
    TryAgain,
    /// No more input, or the decoder has been fully drained.
    #[error("End of stream")]
    EndOfStream,
    /// The library ran out of memory (device or host).
    #[error("Out of memory")]
    OutOfMemory,
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl LibraryError {
    /// `true` for conditions that stop a drain loop without being errors.
    pub fn is_benign(&self) -> bool {
        matches!(self, LibraryError::TryAgain | LibraryError::EndOfStream)
    }
}

impl From<FfmpegError> for LibraryError {
    fn from(error: FfmpegError) -> Self {
        match error {
            FfmpegError::Eof => LibraryError::EndOfStream,
            FfmpegError::Other { errno } if errno == ffmpeg_next::error::EAGAIN => {
                LibraryError::TryAgain
            }
            FfmpegError::Other { errno } if errno == libc::ENOMEM => LibraryError::OutOfMemory,
            other => LibraryError::Other(other.to_string()),
        }
    }
}

impl From<LibraryError> for ReelError {
    fn from(error: LibraryError) -> Self {
        ReelError::FfmpegError(error.to_string())
    }
}
