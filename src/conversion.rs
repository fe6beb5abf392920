//! Pixel-format conversion to the display layout.
//!
//! [`FrameConverter`] turns host-resident decoded frames into packed
//! [`FrameImage`]s. It caches one scaling context, recreated whenever the
//! source or destination format or dimensions change, and draws both its
//! destination frames and the final pixel payloads from pools.

use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};

use crate::config::PixelFormat;
use crate::frame::FrameImage;
use crate::pool::{FramePool, Pooled};
use crate::timing::copy_packed_rows;

/// Resolve the layout a `source` frame is actually converted to.
///
/// NV12 frames always go to packed YUYV 4:2:2, whatever the requested
/// target.
///
/// ```
/// use ffmpeg_next::format::Pixel;
/// use reelthread::PixelFormat;
/// use reelthread::conversion::resolve_target;
///
/// assert_eq!(resolve_target(Pixel::NV12, PixelFormat::Rgba8), PixelFormat::Yuyv422);
/// assert_eq!(resolve_target(Pixel::YUV420P, PixelFormat::Rgba8), PixelFormat::Rgba8);
/// ```
pub fn resolve_target(source: Pixel, target: PixelFormat) -> PixelFormat {
    match source {
        Pixel::NV12 => PixelFormat::Yuyv422,
        _ => target,
    }
}

/// Whether a pooled `frame` can be written as `format` at `width` x `height`
/// without reallocating its planes.
pub fn frame_matches(frame: &VideoFrame, format: Pixel, width: u32, height: u32) -> bool {
    frame.format() == format && frame.width() == width && frame.height() == height
}

/// Converts decoded frames to a packed display layout.
pub struct FrameConverter {
    target: PixelFormat,
    scaler: Option<ScalingContext>,
    frames: FramePool<VideoFrame>,
    images: FramePool<Vec<u8>>,
}

impl FrameConverter {
    /// Create a converter producing `target` frames.
    pub fn new(target: PixelFormat) -> Self {
        Self {
            target,
            scaler: None,
            frames: FramePool::new(),
            images: FramePool::new(),
        }
    }

    /// Requested display layout.
    pub fn target(&self) -> PixelFormat {
        self.target
    }

    /// Pool the packed payloads are drawn from.
    pub fn image_pool(&self) -> &FramePool<Vec<u8>> {
        &self.images
    }

    /// Pool the conversion destinations are drawn from.
    pub fn frame_pool(&self) -> &FramePool<VideoFrame> {
        &self.frames
    }

    /// Convert `source` to the display layout.
    ///
    /// The source frame is released as soon as conversion has been
    /// attempted. Returns `None` if the conversion fails; the failure is
    /// logged.
    pub fn convert(&mut self, source: Pooled<VideoFrame>) -> Option<FrameImage> {
        let source_format = source.format();
        let resolved = resolve_target(source_format, self.target);

        if PixelFormat::from_ffmpeg_pixel(source_format) == Some(resolved) {
            return Some(self.pack(&source, resolved));
        }

        let (width, height) = (source.width(), source.height());
        if let Err(error) = self.ensure_scaler(source_format, width, height, resolved) {
            log::warn!("Failed to create scaler from {source_format:?} to {resolved:?}: {error}");
            return None;
        }

        let destination_format = resolved.to_ffmpeg_pixel();
        let mut destination = self.frames.acquire_with(VideoFrame::empty);
        if !frame_matches(&destination, destination_format, width, height) {
            *destination = VideoFrame::new(destination_format, width, height);
        }

        let scaler = self.scaler.as_mut()?;
        let result = scaler.run(&source, &mut destination);
        drop(source);

        if let Err(error) = result {
            log::warn!("Failed to convert {source_format:?} frame to {resolved:?}: {error}");
            return None;
        }

        Some(self.pack(&destination, resolved))
    }

    fn ensure_scaler(
        &mut self,
        source_format: Pixel,
        width: u32,
        height: u32,
        target: PixelFormat,
    ) -> Result<(), ffmpeg_next::Error> {
        let destination_format = target.to_ffmpeg_pixel();

        // Recreate if either end changed format or dimensions.
        let needs_recreate = self.scaler.as_ref().is_none_or(|scaler| {
            let input = scaler.input();
            let output = scaler.output();
            input.format != source_format
                || input.width != width
                || input.height != height
                || output.format != destination_format
                || output.width != width
                || output.height != height
        });

        if needs_recreate {
            self.scaler = Some(ScalingContext::get(
                source_format,
                width,
                height,
                destination_format,
                width,
                height,
                ScalingFlags::FAST_BILINEAR,
            )?);
        }

        Ok(())
    }

    fn pack(&self, frame: &VideoFrame, format: PixelFormat) -> FrameImage {
        let mut data = self.images.acquire();
        copy_packed_rows(frame, format.row_bytes(frame.width()), &mut data);
        FrameImage::new(frame.width(), frame.height(), format, data)
    }
}
