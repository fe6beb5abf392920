//! Decoder configuration.
//!
//! [`DecoderOptions`] is a builder for everything about a
//! [`VideoDecoder`](crate::VideoDecoder) that is fixed once it starts:
//! looping, which hardware backends may be tried, the display pixel
//! layout, and the pacing of the decode loop.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use reelthread::{DecoderOptions, HardwareBackend, HardwareBackends, PixelFormat};
//!
//! let options = DecoderOptions::new()
//!     .with_looping(true)
//!     .with_hardware_backends(HardwareBackends::NONE.with(HardwareBackend::Vaapi))
//!     .with_pixel_format(PixelFormat::Rgba8)
//!     .with_end_of_stream_backoff(Duration::from_millis(20));
//! assert!(options.looping());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::hardware::HardwareBackends;

/// Number of completed frames the decode loop keeps ready by default.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Pixel layout of frames handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bpp). This is the default and what textures expect.
    #[default]
    Rgba8,
    /// 8-bit RGB (24 bpp).
    Rgb8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
    /// Packed YUYV 4:2:2 (16 bpp).
    ///
    /// NV12 sources, which is what most hardware decoders transfer to the
    /// host, are always delivered in this layout.
    Yuyv422,
}

impl PixelFormat {
    /// Map to the corresponding FFmpeg pixel format.
    pub fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Gray8 => Pixel::GRAY8,
            PixelFormat::Yuyv422 => Pixel::YUYV422,
        }
    }

    /// Map from an FFmpeg pixel format, if it is one we deliver.
    pub fn from_ffmpeg_pixel(pixel: Pixel) -> Option<Self> {
        match pixel {
            Pixel::RGBA => Some(PixelFormat::Rgba8),
            Pixel::RGB24 => Some(PixelFormat::Rgb8),
            Pixel::GRAY8 => Some(PixelFormat::Gray8),
            Pixel::YUYV422 => Some(PixelFormat::Yuyv422),
            _ => None,
        }
    }

    /// Bytes per pixel in a tightly packed buffer.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
            PixelFormat::Yuyv422 => 2,
        }
    }

    /// Bytes in one packed row of `width` pixels. YUYV rows always hold
    /// whole two-pixel macropixels.
    pub fn row_bytes(self, width: u32) -> usize {
        match self {
            PixelFormat::Yuyv422 => (width as usize).div_ceil(2) * 4,
            other => width as usize * other.bytes_per_pixel(),
        }
    }

    /// Parse a format name (`rgba8`, `rgb8`, `gray8`, `yuyv422`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rgba" | "rgba8" => Some(PixelFormat::Rgba8),
            "rgb" | "rgb8" | "rgb24" => Some(PixelFormat::Rgb8),
            "gray" | "gray8" | "grey" => Some(PixelFormat::Gray8),
            "yuyv" | "yuyv422" => Some(PixelFormat::Yuyv422),
            _ => None,
        }
    }
}

/// Configuration for a [`VideoDecoder`](crate::VideoDecoder).
#[derive(Clone)]
pub struct DecoderOptions {
    pub(crate) looping: bool,
    pub(crate) hardware_backends: HardwareBackends,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) queue_capacity: usize,
    pub(crate) idle_backoff: Duration,
    pub(crate) end_of_stream_backoff: Duration,
    pub(crate) io_buffer_size: usize,
    pub(crate) thread_name: String,
}

impl Debug for DecoderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecoderOptions")
            .field("looping", &self.looping)
            .field("hardware_backends", &self.hardware_backends)
            .field("pixel_format", &self.pixel_format)
            .field("queue_capacity", &self.queue_capacity)
            .field("idle_backoff", &self.idle_backoff)
            .field("end_of_stream_backoff", &self.end_of_stream_backoff)
            .field("io_buffer_size", &self.io_buffer_size)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderOptions {
    /// Create options with default settings.
    ///
    /// Defaults: no looping, every hardware backend allowed, RGBA output,
    /// two frames of look-ahead, 1 ms idle backoff, 50 ms end-of-stream
    /// backoff, 4 KiB I/O buffer.
    pub fn new() -> Self {
        Self {
            looping: false,
            hardware_backends: HardwareBackends::ALL,
            pixel_format: PixelFormat::Rgba8,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_backoff: Duration::from_millis(1),
            end_of_stream_backoff: Duration::from_millis(50),
            io_buffer_size: 4096,
            thread_name: "reelthread-decode".to_string(),
        }
    }

    /// Restart from the beginning instead of stopping at end of stream.
    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Restrict which hardware backends may be tried.
    #[must_use]
    pub fn with_hardware_backends(mut self, backends: HardwareBackends) -> Self {
        self.hardware_backends = backends;
        self
    }

    /// Never try hardware decoding.
    #[must_use]
    pub fn with_software_only(self) -> Self {
        self.with_hardware_backends(HardwareBackends::NONE)
    }

    /// Set the pixel layout of delivered frames.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set how many completed frames may wait for the consumer before the
    /// decode loop pauses. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set how long the loop sleeps when the output queue is full.
    #[must_use]
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Set how long the loop sleeps per iteration at end of stream.
    #[must_use]
    pub fn with_end_of_stream_backoff(mut self, backoff: Duration) -> Self {
        self.end_of_stream_backoff = backoff;
        self
    }

    /// Set the size of the buffer between the byte source and the demuxer.
    /// Clamped to a minimum of 512 bytes.
    #[must_use]
    pub fn with_io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size.max(512);
        self
    }

    /// Name the decode thread.
    #[must_use]
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Whether decoding restarts from zero at end of stream.
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Hardware backends the selector may try.
    pub fn hardware_backends(&self) -> HardwareBackends {
        self.hardware_backends
    }

    /// Requested display layout.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Frames decoded ahead of the consumer.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Wait while the output queue is full.
    pub fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    /// Sleep between checks at end of stream.
    pub fn end_of_stream_backoff(&self) -> Duration {
        self.end_of_stream_backoff
    }

    /// AVIO read buffer size in bytes.
    pub fn io_buffer_size(&self) -> usize {
        self.io_buffer_size
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}
