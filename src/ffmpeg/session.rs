//! An open decoder context.

use std::ptr;

use ffmpeg_next::Error as FfmpegError;
use ffmpeg_sys_next::{AVCodecContext, AVCodecParameters, AVPacket, AVFrame, AVRational};

use crate::hardware::DeviceKind;
use crate::selector::{CodecRef, DecoderCandidate};

/// One opened codec context, with its hardware device if any.
///
/// Dropping the session frees the context and releases the device.
pub(crate) struct CodecSession {
    context: *mut AVCodecContext,
    codec: CodecRef,
    device: Option<DeviceKind>,
}

impl CodecSession {
    /// Open `candidate` for a stream described by `parameters`.
    ///
    /// Every failure releases whatever was allocated for this candidate
    /// before returning.
    pub(crate) fn open(
        candidate: &DecoderCandidate<CodecRef>,
        parameters: *const AVCodecParameters,
        time_base: AVRational,
    ) -> Result<Self, String> {
        let codec = candidate.codec;
        let context = unsafe { ffmpeg_sys_next::avcodec_alloc_context3(codec.as_ptr()) };
        if context.is_null() {
            return Err("couldn't allocate codec context".to_string());
        }

        let session = Self {
            context,
            codec,
            device: candidate.device,
        };

        unsafe { (*context).pkt_timebase = time_base };

        let result = unsafe { ffmpeg_sys_next::avcodec_parameters_to_context(context, parameters) };
        if result < 0 {
            return Err(format!(
                "couldn't copy codec parameters: {}",
                FfmpegError::from(result)
            ));
        }

        match candidate.device {
            Some(device) => {
                let result = unsafe {
                    ffmpeg_sys_next::av_hwdevice_ctx_create(
                        &mut (*context).hw_device_ctx,
                        device.to_av(),
                        ptr::null(),
                        ptr::null_mut(),
                        0,
                    )
                };
                if result < 0 {
                    return Err(format!(
                        "couldn't create {device} device context: {}",
                        FfmpegError::from(result)
                    ));
                }
            }
            None => unsafe { (*context).thread_count = 0 },
        }

        let result = unsafe { ffmpeg_sys_next::avcodec_open2(context, codec.as_ptr(), ptr::null_mut()) };
        if result < 0 {
            return Err(format!("couldn't open codec: {}", FfmpegError::from(result)));
        }

        Ok(session)
    }

    pub(crate) fn codec_name(&self) -> String {
        self.codec.name()
    }

    pub(crate) fn device(&self) -> Option<DeviceKind> {
        self.device
    }

    /// Whether a hardware device context is attached.
    pub(crate) fn uses_hardware(&self) -> bool {
        !unsafe { (*self.context).hw_device_ctx }.is_null()
    }

    pub(crate) fn send_packet(&mut self, packet: *const AVPacket) -> Result<(), FfmpegError> {
        match unsafe { ffmpeg_sys_next::avcodec_send_packet(self.context, packet) } {
            result if result < 0 => Err(FfmpegError::from(result)),
            _ => Ok(()),
        }
    }

    pub(crate) fn receive_frame(&mut self, frame: *mut AVFrame) -> Result<(), FfmpegError> {
        match unsafe { ffmpeg_sys_next::avcodec_receive_frame(self.context, frame) } {
            result if result < 0 => Err(FfmpegError::from(result)),
            _ => Ok(()),
        }
    }

    /// Discard buffered packets and frames.
    pub(crate) fn flush(&mut self) {
        unsafe { ffmpeg_sys_next::avcodec_flush_buffers(self.context) };
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        unsafe { ffmpeg_sys_next::avcodec_free_context(&mut self.context) };
    }
}
