//! Hardware decoding backends and the fallback policy.
//!
//! This module names the hardware device kinds FFmpeg can decode on, the
//! [`HardwareBackends`] bitmask callers use to say which of them are
//! allowed, the fixed desirability score the
//! [selector](crate::selector) ranks them by, and [`HardwarePolicy`], the
//! per-decoder switch that turns hardware decoding off for good once a
//! hardware session misbehaves.
//!
//! # Platform Support
//!
//! Which device kinds actually work depends on the FFmpeg build and the
//! host's GPU drivers. A device kind that fails to open is skipped and the
//! next candidate is tried; the software decoder is always last in line.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_sys_next::{AVHWDeviceType, AVPixelFormat};

use crate::error::LibraryError;

/// A hardware decoding backend that can be allowed or disallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareBackend {
    /// NVIDIA NVDEC through CUDA.
    Nvdec,
    /// Intel Quick Sync Video.
    QuickSync,
    /// DirectX Video Acceleration 2 (Windows).
    Dxva2,
    /// Video Decode and Presentation API for Unix.
    Vdpau,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// Android `MediaCodec`.
    MediaCodec,
    /// Apple VideoToolbox.
    VideoToolbox,
}

impl HardwareBackend {
    /// Every backend, in bit order.
    pub const ALL: [HardwareBackend; 7] = [
        HardwareBackend::Nvdec,
        HardwareBackend::QuickSync,
        HardwareBackend::Dxva2,
        HardwareBackend::Vdpau,
        HardwareBackend::Vaapi,
        HardwareBackend::MediaCodec,
        HardwareBackend::VideoToolbox,
    ];

    const fn bit(self) -> u32 {
        match self {
            HardwareBackend::Nvdec => 1,
            HardwareBackend::QuickSync => 2,
            HardwareBackend::Dxva2 => 4,
            HardwareBackend::Vdpau => 8,
            HardwareBackend::Vaapi => 16,
            HardwareBackend::MediaCodec => 32,
            HardwareBackend::VideoToolbox => 64,
        }
    }

    /// Lower-case name, as accepted by the CLI.
    pub fn name(self) -> &'static str {
        match self {
            HardwareBackend::Nvdec => "nvdec",
            HardwareBackend::QuickSync => "qsv",
            HardwareBackend::Dxva2 => "dxva2",
            HardwareBackend::Vdpau => "vdpau",
            HardwareBackend::Vaapi => "vaapi",
            HardwareBackend::MediaCodec => "mediacodec",
            HardwareBackend::VideoToolbox => "videotoolbox",
        }
    }

    /// Parse a backend name (case-insensitive). `cuda` is accepted for NVDEC.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "nvdec" | "cuda" => Some(HardwareBackend::Nvdec),
            "qsv" | "quicksync" => Some(HardwareBackend::QuickSync),
            "dxva2" => Some(HardwareBackend::Dxva2),
            "vdpau" => Some(HardwareBackend::Vdpau),
            "vaapi" => Some(HardwareBackend::Vaapi),
            "mediacodec" => Some(HardwareBackend::MediaCodec),
            "videotoolbox" => Some(HardwareBackend::VideoToolbox),
            _ => None,
        }
    }
}

/// A set of allowed [`HardwareBackend`]s.
///
/// An empty set means hardware decoding is not requested.
///
/// ```
/// use reelthread::{HardwareBackend, HardwareBackends};
///
/// let backends = HardwareBackends::NONE
///     .with(HardwareBackend::Vaapi)
///     .with(HardwareBackend::Nvdec);
/// assert!(backends.contains(HardwareBackend::Vaapi));
/// assert!(!backends.contains(HardwareBackend::Dxva2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareBackends(u32);

impl HardwareBackends {
    /// No hardware backend.
    pub const NONE: HardwareBackends = HardwareBackends(0);
    /// Every hardware backend.
    pub const ALL: HardwareBackends = HardwareBackends(u32::MAX);

    /// Build a set from individual backends.
    pub fn from_backends<I: IntoIterator<Item = HardwareBackend>>(backends: I) -> Self {
        backends.into_iter().fold(Self::NONE, Self::with)
    }

    /// Return a copy of this set with `backend` added.
    #[must_use]
    pub const fn with(self, backend: HardwareBackend) -> Self {
        HardwareBackends(self.0 | backend.bit())
    }

    /// Return a copy of this set with `backend` removed.
    #[must_use]
    pub const fn without(self, backend: HardwareBackend) -> Self {
        HardwareBackends(self.0 & !backend.bit())
    }

    /// Whether `backend` is in the set.
    pub const fn contains(self, backend: HardwareBackend) -> bool {
        self.0 & backend.bit() != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The backends in the set, in bit order.
    pub fn iter(self) -> impl Iterator<Item = HardwareBackend> {
        HardwareBackend::ALL
            .into_iter()
            .filter(move |backend| self.contains(*backend))
    }
}

/// A hardware device kind as FFmpeg names it.
///
/// Only a subset maps to a [`HardwareBackend`]; the others can be listed
/// by [`available_hardware_devices`] but never become decoder candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Vdpau,
    Cuda,
    Vaapi,
    Dxva2,
    Qsv,
    VideoToolbox,
    D3d11va,
    Drm,
    OpenCl,
    MediaCodec,
    Vulkan,
}

impl DeviceKind {
    /// Map from FFmpeg's device type. `None` for `NONE` and unknown kinds.
    pub fn from_av(device_type: AVHWDeviceType) -> Option<Self> {
        match device_type {
            AVHWDeviceType::AV_HWDEVICE_TYPE_VDPAU => Some(DeviceKind::Vdpau),
            AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA => Some(DeviceKind::Cuda),
            AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI => Some(DeviceKind::Vaapi),
            AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2 => Some(DeviceKind::Dxva2),
            AVHWDeviceType::AV_HWDEVICE_TYPE_QSV => Some(DeviceKind::Qsv),
            AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX => Some(DeviceKind::VideoToolbox),
            AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA => Some(DeviceKind::D3d11va),
            AVHWDeviceType::AV_HWDEVICE_TYPE_DRM => Some(DeviceKind::Drm),
            AVHWDeviceType::AV_HWDEVICE_TYPE_OPENCL => Some(DeviceKind::OpenCl),
            AVHWDeviceType::AV_HWDEVICE_TYPE_MEDIACODEC => Some(DeviceKind::MediaCodec),
            AVHWDeviceType::AV_HWDEVICE_TYPE_VULKAN => Some(DeviceKind::Vulkan),
            _ => None,
        }
    }

    /// Map back to FFmpeg's device type.
    pub fn to_av(self) -> AVHWDeviceType {
        match self {
            DeviceKind::Vdpau => AVHWDeviceType::AV_HWDEVICE_TYPE_VDPAU,
            DeviceKind::Cuda => AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            DeviceKind::Vaapi => AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            DeviceKind::Dxva2 => AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
            DeviceKind::Qsv => AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
            DeviceKind::VideoToolbox => AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            DeviceKind::D3d11va => AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            DeviceKind::Drm => AVHWDeviceType::AV_HWDEVICE_TYPE_DRM,
            DeviceKind::OpenCl => AVHWDeviceType::AV_HWDEVICE_TYPE_OPENCL,
            DeviceKind::MediaCodec => AVHWDeviceType::AV_HWDEVICE_TYPE_MEDIACODEC,
            DeviceKind::Vulkan => AVHWDeviceType::AV_HWDEVICE_TYPE_VULKAN,
        }
    }

    /// The allow-list flag this device kind is governed by.
    ///
    /// VideoToolbox has a flag but no mapping; it is never offered as a
    /// candidate.
    pub fn backend(self) -> Option<HardwareBackend> {
        match self {
            DeviceKind::Vdpau => Some(HardwareBackend::Vdpau),
            DeviceKind::Cuda => Some(HardwareBackend::Nvdec),
            DeviceKind::Vaapi => Some(HardwareBackend::Vaapi),
            DeviceKind::Dxva2 => Some(HardwareBackend::Dxva2),
            DeviceKind::Qsv => Some(HardwareBackend::QuickSync),
            DeviceKind::MediaCodec => Some(HardwareBackend::MediaCodec),
            _ => None,
        }
    }

    /// Empirical desirability; higher sorts first.
    pub fn score(self) -> i32 {
        match self {
            DeviceKind::Vdpau | DeviceKind::Cuda | DeviceKind::MediaCodec => 10,
            DeviceKind::Vaapi | DeviceKind::Qsv => 9,
            DeviceKind::Dxva2 => 8,
            _ => i32::MIN,
        }
    }

    /// FFmpeg's name for the device kind (e.g. `"cuda"`).
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Vdpau => "vdpau",
            DeviceKind::Cuda => "cuda",
            DeviceKind::Vaapi => "vaapi",
            DeviceKind::Dxva2 => "dxva2",
            DeviceKind::Qsv => "qsv",
            DeviceKind::VideoToolbox => "videotoolbox",
            DeviceKind::D3d11va => "d3d11va",
            DeviceKind::Drm => "drm",
            DeviceKind::OpenCl => "opencl",
            DeviceKind::MediaCodec => "mediacodec",
            DeviceKind::Vulkan => "vulkan",
        }
    }
}

impl Display for DeviceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Score of a candidate with an optional device; software sorts last.
pub fn candidate_score(device: Option<DeviceKind>) -> i32 {
    device.map_or(i32::MIN, DeviceKind::score)
}

/// List the hardware device kinds compiled into the linked FFmpeg.
pub fn available_hardware_devices() -> Vec<DeviceKind> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }
        if let Some(kind) = DeviceKind::from_av(device_type) {
            devices.push(kind);
        }
    }

    devices
}

/// Whether frames in this pixel format live in device memory and must be
/// transferred before the host can read them.
pub fn is_hardware_pixel_format(format: AVPixelFormat) -> bool {
    matches!(
        format,
        AVPixelFormat::AV_PIX_FMT_VDPAU
            | AVPixelFormat::AV_PIX_FMT_CUDA
            | AVPixelFormat::AV_PIX_FMT_VAAPI
            | AVPixelFormat::AV_PIX_FMT_DXVA2_VLD
            | AVPixelFormat::AV_PIX_FMT_QSV
            | AVPixelFormat::AV_PIX_FMT_VIDEOTOOLBOX
            | AVPixelFormat::AV_PIX_FMT_D3D11
            | AVPixelFormat::AV_PIX_FMT_D3D11VA_VLD
            | AVPixelFormat::AV_PIX_FMT_DRM_PRIME
            | AVPixelFormat::AV_PIX_FMT_OPENCL
            | AVPixelFormat::AV_PIX_FMT_MEDIACODEC
            | AVPixelFormat::AV_PIX_FMT_VULKAN
    )
}

/// Per-decoder hardware decoding switch.
///
/// Starts enabled when any backend is allowed. The first failure of a
/// hardware-backed session disables it for the rest of the decoder's life;
/// an out-of-memory failure also empties the allowed set.
///
/// ```
/// use reelthread::{HardwareBackends, HardwarePolicy, LibraryError};
///
/// let mut policy = HardwarePolicy::new(HardwareBackends::ALL);
/// assert!(policy.on_failure(&LibraryError::OutOfMemory, true));
/// assert!(policy.requested_backends().is_empty());
/// assert!(policy.backends().is_empty());
/// // Already disabled: further failures change nothing.
/// assert!(!policy.on_failure(&LibraryError::OutOfMemory, true));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwarePolicy {
    enabled: bool,
    backends: HardwareBackends,
}

impl HardwarePolicy {
    /// Create a policy allowing `backends`.
    pub fn new(backends: HardwareBackends) -> Self {
        Self {
            enabled: !backends.is_empty(),
            backends,
        }
    }

    /// Whether hardware decoding may still be requested.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The allowed set, regardless of the enabled switch.
    pub fn backends(&self) -> HardwareBackends {
        self.backends
    }

    /// The set to hand to the selector for the next session.
    pub fn requested_backends(&self) -> HardwareBackends {
        if self.enabled {
            self.backends
        } else {
            HardwareBackends::NONE
        }
    }

    /// React to a failed submit, receive, or transfer.
    ///
    /// Returns `true` when the caller must rebuild the codec session.
    /// A no-op (returning `false`) when hardware is already disabled, the
    /// failing session was not hardware-backed, or `error` is a benign
    /// try-again or end-of-stream result.
    pub fn on_failure(&mut self, error: &LibraryError, session_uses_hardware: bool) -> bool {
        if !self.enabled
            || self.backends.is_empty()
            || !session_uses_hardware
            || error.is_benign()
        {
            return false;
        }

        self.enabled = false;

        if *error == LibraryError::OutOfMemory {
            log::warn!("Disabling hardware decoding of video due to a lack of memory");
            self.backends = HardwareBackends::NONE;
        } else {
            log::warn!("Disabling hardware decoding of video due to an unexpected error: {error}");
        }

        true
    }
}
