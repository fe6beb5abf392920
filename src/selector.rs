//! Decoder candidate selection.
//!
//! Given a codec and the set of allowed hardware backends, the selector
//! produces the ordered list of decoder candidates a session should be
//! opened from. Hardware candidates come first, ranked by
//! [`DeviceKind::score`]; the software decoder is always present and always
//! last. Ties keep discovery order.
//!
//! The ranking itself is [`rank_candidates`], which works on any codec
//! handle so it can be exercised without FFmpeg. [`available_decoders`]
//! feeds it from FFmpeg's codec registry.

use std::ffi::CStr;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::os::raw::c_void;

use ffmpeg_next::codec::Id as CodecId;
use ffmpeg_sys_next::{AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX, AVCodec, AVCodecID};

use crate::hardware::{DeviceKind, HardwareBackends, candidate_score};

/// One way of decoding a stream: a codec implementation, optionally bound
/// to a hardware device kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderCandidate<C> {
    /// The codec implementation to open.
    pub codec: C,
    /// Hardware device to attach, or `None` for software decoding.
    pub device: Option<DeviceKind>,
}

impl<C> DecoderCandidate<C> {
    /// Whether this candidate decodes in software.
    pub fn is_software(&self) -> bool {
        self.device.is_none()
    }
}

/// Rank decoder implementations for one codec.
///
/// `implementations` yields each registered decoder for the codec, in
/// registry order, together with the device kinds it declares support for.
/// The first implementation becomes the software fallback. When `allowed`
/// is empty only that first implementation is looked at.
///
/// ```
/// use reelthread::selector::rank_candidates;
/// use reelthread::{DeviceKind, HardwareBackend, HardwareBackends};
///
/// let allowed = HardwareBackends::NONE
///     .with(HardwareBackend::Vaapi)
///     .with(HardwareBackend::Nvdec);
/// let ranked = rank_candidates(
///     vec![("h264", vec![DeviceKind::Vaapi, DeviceKind::Cuda])],
///     allowed,
/// );
/// assert_eq!(ranked[0].device, Some(DeviceKind::Cuda));
/// assert_eq!(ranked[1].device, Some(DeviceKind::Vaapi));
/// assert!(ranked[2].is_software());
/// ```
pub fn rank_candidates<C, I>(implementations: I, allowed: HardwareBackends) -> Vec<DecoderCandidate<C>>
where
    C: Clone,
    I: IntoIterator<Item = (C, Vec<DeviceKind>)>,
{
    let mut candidates = Vec::new();
    let mut software: Option<C> = None;

    for (codec, devices) in implementations {
        if software.is_none() {
            software = Some(codec.clone());
        }

        if allowed.is_empty() {
            break;
        }

        for device in devices {
            let Some(backend) = device.backend() else {
                continue;
            };
            if !allowed.contains(backend) {
                continue;
            }
            candidates.push(DecoderCandidate {
                codec: codec.clone(),
                device: Some(device),
            });
        }
    }

    if let Some(codec) = software {
        candidates.push(DecoderCandidate {
            codec,
            device: None,
        });
    }

    // `sort_by` is stable, so equal scores keep discovery order.
    candidates.sort_by(|a, b| candidate_score(b.device).cmp(&candidate_score(a.device)));
    candidates
}

/// A registered FFmpeg decoder implementation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CodecRef {
    ptr: *const AVCodec,
}

// SAFETY: AVCodec descriptors are static, immutable registry entries.
unsafe impl Send for CodecRef {}
unsafe impl Sync for CodecRef {}

impl CodecRef {
    pub(crate) fn as_ptr(&self) -> *const AVCodec {
        self.ptr
    }

    /// Short name of the implementation (e.g. `"h264"`, `"h264_cuvid"`).
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr((*self.ptr).name) }
            .to_string_lossy()
            .into_owned()
    }

    /// Device kinds this implementation can decode on through a device
    /// context.
    pub fn supported_devices(&self) -> Vec<DeviceKind> {
        let mut devices = Vec::new();
        let mut index = 0;

        loop {
            let config = unsafe { ffmpeg_sys_next::avcodec_get_hw_config(self.ptr, index) };
            if config.is_null() {
                break;
            }

            let methods = unsafe { (*config).methods };
            if methods & (AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32) != 0 {
                let device_type = unsafe { (*config).device_type };
                if let Some(kind) = DeviceKind::from_av(device_type) {
                    devices.push(kind);
                }
            }

            index += 1;
        }

        devices
    }
}

impl Debug for CodecRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("CodecRef").field(&self.name()).finish()
    }
}

/// Every decoder FFmpeg has registered for `codec_id`, in registry order.
pub fn registered_decoders(codec_id: CodecId) -> Vec<CodecRef> {
    let target: AVCodecID = codec_id.into();
    let mut decoders = Vec::new();
    let mut opaque: *mut c_void = std::ptr::null_mut();

    loop {
        let codec = unsafe { ffmpeg_sys_next::av_codec_iterate(&mut opaque) };
        if codec.is_null() {
            break;
        }

        let is_decoder = unsafe { ffmpeg_sys_next::av_codec_is_decoder(codec) } != 0;
        if is_decoder && unsafe { (*codec).id } == target {
            decoders.push(CodecRef { ptr: codec });
        }
    }

    decoders
}

/// Ordered decoder candidates for `codec_id` under `allowed`.
///
/// `format_hint` is the container's short name, used for diagnostics only.
pub fn available_decoders(
    format_hint: Option<&str>,
    codec_id: CodecId,
    allowed: HardwareBackends,
) -> Vec<DecoderCandidate<CodecRef>> {
    let implementations = registered_decoders(codec_id)
        .into_iter()
        .map(|codec| {
            let devices = codec.supported_devices();
            (codec, devices)
        });
    let candidates = rank_candidates(implementations, allowed);

    log::debug!(
        "Decoder candidates for {codec_id:?} in {}: {}",
        format_hint.unwrap_or("unknown container"),
        candidates
            .iter()
            .map(|candidate| match candidate.device {
                Some(device) => format!("{}@{device}", candidate.codec.name()),
                None => candidate.codec.name(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    );

    candidates
}
