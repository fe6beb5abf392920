//! Decoder probing.
//!
//! [`DecoderProbe`] opens a media file, finds its best video stream and
//! reports which decoder candidates the selector would try, in order,
//! without opening any of them. Useful for checking what hardware paths a
//! machine offers for a given file.

use std::path::Path;

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::media::Type;
use serde_json::{Value, json};

use crate::error::ReelError;
use crate::hardware::{DeviceKind, HardwareBackends};
use crate::selector::available_decoders;

/// One decoder candidate, as reported by [`DecoderProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInfo {
    /// Codec implementation name (e.g. `"h264"`, `"h264_cuvid"`).
    pub codec: String,
    /// Hardware device to attach, or `None` for software decoding.
    pub device: Option<DeviceKind>,
}

/// What [`DecoderProbe::probe`] found.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Container format short name.
    pub format: String,
    /// Codec of the best video stream.
    pub codec: String,
    /// Stream duration in milliseconds.
    pub duration_ms: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Decoder candidates in the order they would be tried.
    pub candidates: Vec<CandidateInfo>,
}

impl ProbeReport {
    /// The report as a JSON value.
    pub fn to_json(&self) -> Value {
        json!({
            "format": self.format,
            "codec": self.codec,
            "duration_ms": self.duration_ms,
            "width": self.width,
            "height": self.height,
            "candidates": self
                .candidates
                .iter()
                .map(|candidate| json!({
                    "codec": candidate.codec,
                    "device": candidate.device.map(DeviceKind::name),
                }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Lightweight decoder probe.
///
/// # Example
///
/// ```no_run
/// use reelthread::{DecoderProbe, HardwareBackends};
///
/// let report = DecoderProbe::probe("input.mp4", HardwareBackends::ALL)?;
/// for candidate in &report.candidates {
///     println!("{} {:?}", candidate.codec, candidate.device);
/// }
/// # Ok::<(), reelthread::ReelError>(())
/// ```
pub struct DecoderProbe;

impl DecoderProbe {
    /// Probe a media file under the `allowed` hardware backends.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::FileOpen`] if the file cannot be opened or
    /// recognised as media, and [`ReelError::NoVideoStream`] if it has no
    /// video.
    pub fn probe<P: AsRef<Path>>(path: P, allowed: HardwareBackends) -> Result<ProbeReport, ReelError> {
        let path = path.as_ref();
        let file_open = |reason: String| ReelError::FileOpen {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| file_open(format!("FFmpeg initialisation failed: {error}")))?;
        let input = ffmpeg_next::format::input(&path).map_err(|error| file_open(error.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ReelError::NoVideoStream)?;
        let codec_id = stream.parameters().id();
        let video = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| file_open(format!("Failed to read video codec parameters: {error}")))?;

        let time_base = stream.time_base();
        let duration_ms = if stream.duration() > 0 {
            stream.duration() as f64 * f64::from(time_base.numerator())
                / f64::from(time_base.denominator())
                * 1000.0
        } else {
            input.duration().max(0) as f64 / 1000.0
        };

        let format = input.format().name().to_string();
        let candidates = available_decoders(Some(&format), codec_id, allowed)
            .into_iter()
            .map(|candidate| CandidateInfo {
                codec: candidate.codec.name(),
                device: candidate.device,
            })
            .collect();

        Ok(ProbeReport {
            format,
            codec: codec_id.name().to_string(),
            duration_ms,
            width: video.width(),
            height: video.height(),
            candidates,
        })
    }

    /// Probe several files. Failures are reported per file.
    pub fn probe_many<P: AsRef<Path>>(
        paths: &[P],
        allowed: HardwareBackends,
    ) -> Vec<Result<ProbeReport, ReelError>> {
        paths.iter().map(|path| Self::probe(path, allowed)).collect()
    }
}
