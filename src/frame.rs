//! Frames handed to the consumer.

use std::time::Duration;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::config::PixelFormat;
use crate::error::ReelError;
use crate::pool::Pooled;

/// A tightly packed pixel payload.
///
/// The bytes live in a buffer borrowed from the decoder's image pool and go
/// back to it when the image is dropped.
#[derive(Debug)]
pub struct FrameImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Pooled<Vec<u8>>,
}

impl FrameImage {
    /// Wrap a packed buffer of `height` rows, each
    /// [`format.row_bytes(width)`](PixelFormat::row_bytes) long.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Pooled<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of [`data`](Self::data).
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes, rows packed without padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy the payload into an [`image::DynamicImage`].
    ///
    /// `Yuyv422` payloads are expanded to RGBA (BT.601, limited range).
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::InvalidFrame`] if the payload length does not
    /// match the frame dimensions.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage, ReelError> {
        let (width, height) = (self.width, self.height);
        let bytes = self.data.to_vec();
        let mismatch = || {
            ReelError::InvalidFrame(format!(
                "{width}x{height} {:?} frame carries {} bytes",
                self.format,
                self.data.len()
            ))
        };

        match self.format {
            PixelFormat::Rgba8 => RgbaImage::from_raw(width, height, bytes)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(mismatch),
            PixelFormat::Rgb8 => RgbImage::from_raw(width, height, bytes)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(mismatch),
            PixelFormat::Gray8 => GrayImage::from_raw(width, height, bytes)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(mismatch),
            PixelFormat::Yuyv422 => {
                let rgba = yuyv_to_rgba(&bytes, width as usize, height as usize).ok_or_else(mismatch)?;
                RgbaImage::from_raw(width, height, rgba)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(mismatch)
            }
        }
    }
}

/// A decoded, display-ready frame and its presentation time.
#[derive(Debug)]
pub struct DisplayableFrame {
    /// Presentation time in milliseconds from stream start.
    pub time_ms: f64,
    /// Pixel payload.
    pub image: FrameImage,
}

impl DisplayableFrame {
    /// Presentation time as a [`Duration`]. Negative times clamp to zero.
    pub fn timestamp(&self) -> Duration {
        Duration::from_secs_f64(self.time_ms.max(0.0) / 1000.0)
    }
}

fn yuyv_to_rgba(yuyv: &[u8], width: usize, height: usize) -> Option<Vec<u8>> {
    // Odd widths still carry a full macropixel for the last column.
    let stride = width.div_ceil(2) * 4;
    if yuyv.len() < stride * height {
        return None;
    }

    let mut rgba = Vec::with_capacity(width * height * 4);
    for row in yuyv.chunks_exact(stride).take(height) {
        let mut written = 0;
        for macropixel in row.chunks_exact(4) {
            let (y0, u, y1, v) = (macropixel[0], macropixel[1], macropixel[2], macropixel[3]);
            for y in [y0, y1] {
                if written == width {
                    break;
                }
                rgba.extend_from_slice(&ycbcr_to_rgba(y, u, v));
                written += 1;
            }
        }
    }
    Some(rgba)
}

fn ycbcr_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = 1.164 * (f32::from(y) - 16.0);
    let d = f32::from(u) - 128.0;
    let e = f32::from(v) - 128.0;

    let clamp = |value: f32| value.round().clamp(0.0, 255.0) as u8;
    [
        clamp(c + 1.596 * e),
        clamp(c - 0.392 * d - 0.813 * e),
        clamp(c + 2.017 * d),
        255,
    ]
}

