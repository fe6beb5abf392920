//! The FFmpeg-backed [`MediaBackend`].

use std::ptr;

use ffmpeg_next::codec::Id as CodecId;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::{Error as FfmpegError, Packet};
use ffmpeg_sys_next::{AV_NOPTS_VALUE, AV_TIME_BASE, AVFMT_FLAG_GENPTS, AVPixelFormat, AVSEEK_FLAG_BACKWARD};

use crate::backend::{FrameTimestamp, MediaBackend, StreamInfo};
use crate::byte_source::ByteSource;
use crate::config::DecoderOptions;
use crate::conversion::{FrameConverter, frame_matches};
use crate::error::{LibraryError, ReelError};
use crate::frame::FrameImage;
use crate::hardware::{HardwareBackends, is_hardware_pixel_format};
use crate::pool::{FramePool, Pooled};
use crate::selector::available_decoders;
use crate::timing::ms_to_stream_timestamp;

use super::io::IoContext;
use super::session::CodecSession;

/// Demuxes and decodes one source with FFmpeg.
pub struct FfmpegBackend {
    // Declared before `io` so the demuxer closes before its I/O context.
    input: Input,
    #[allow(dead_code)]
    io: IoContext,
    info: StreamInfo,
    codec_id: CodecId,
    session: Option<CodecSession>,
    working: VideoFrame,
    transfers: FramePool<VideoFrame>,
    converter: FrameConverter,
}

// SAFETY: the backend exclusively owns its demuxer, AVIO context, codec
// session and scaler. It is moved onto the decode thread once and only ever
// used from there.
unsafe impl Send for FfmpegBackend {}

impl FfmpegBackend {
    fn open_input(io: &mut IoContext) -> Result<Input, ReelError> {
        let mut context = unsafe { ffmpeg_sys_next::avformat_alloc_context() };
        if context.is_null() {
            return Err(ReelError::SourceOpen("Failed to allocate format context".to_string()));
        }

        unsafe {
            (*context).pb = io.as_mut_ptr();
            // Hardware decoders only read `pts`.
            (*context).flags |= AVFMT_FLAG_GENPTS as i32;
        }

        let result = unsafe {
            ffmpeg_sys_next::avformat_open_input(
                &mut context,
                c"stream".as_ptr(),
                ptr::null(),
                ptr::null_mut(),
            )
        };
        if result < 0 {
            // avformat_open_input frees the context on failure.
            return Err(ReelError::SourceOpen(FfmpegError::from(result).to_string()));
        }

        let result = unsafe { ffmpeg_sys_next::avformat_find_stream_info(context, ptr::null_mut()) };
        if result < 0 {
            unsafe { ffmpeg_sys_next::avformat_close_input(&mut context) };
            return Err(ReelError::StreamInfo(FfmpegError::from(result).to_string()));
        }

        Ok(unsafe { Input::wrap(context) })
    }

    fn describe_stream(input: &Input) -> Result<(StreamInfo, CodecId), ReelError> {
        let stream = input
            .streams()
            .best(MediaType::Video)
            .ok_or(ReelError::NoVideoStream)?;

        let time_base = stream.time_base();
        let seconds_per_tick = f64::from(time_base.numerator()) / f64::from(time_base.denominator());
        let duration_ms = if stream.duration() > 0 {
            stream.duration() as f64 * seconds_per_tick * 1000.0
        } else {
            input.duration() as f64 / f64::from(AV_TIME_BASE) * 1000.0
        };
        let start_time = match stream.start_time() {
            AV_NOPTS_VALUE => 0,
            start => start,
        };
        let codec_id = stream.parameters().id();

        let info = StreamInfo {
            index: stream.index(),
            time_base,
            start_time,
            duration_ms: duration_ms.max(0.0),
            codec: codec_id.name().to_string(),
            format: input.format().name().to_string(),
        };
        Ok((info, codec_id))
    }

    fn session_mut(&mut self) -> Result<&mut CodecSession, LibraryError> {
        self.session
            .as_mut()
            .ok_or_else(|| LibraryError::Other("no open codec session".to_string()))
    }
}

impl MediaBackend for FfmpegBackend {
    type Source = Box<dyn ByteSource>;
    type Packet = Packet;
    type Frame = Pooled<VideoFrame>;

    fn prepare(source: Self::Source, options: &DecoderOptions) -> Result<Self, ReelError> {
        ffmpeg_next::init().map_err(|error| ReelError::FfmpegError(error.to_string()))?;

        let mut io = IoContext::new(source, options.io_buffer_size())?;
        let input = Self::open_input(&mut io)?;
        let (info, codec_id) = Self::describe_stream(&input)?;

        log::debug!(
            "Opened {} stream #{} ({}), {:.0} ms",
            info.format,
            info.index,
            info.codec,
            info.duration_ms
        );

        Ok(Self {
            input,
            io,
            info,
            codec_id,
            session: None,
            working: VideoFrame::empty(),
            transfers: FramePool::new(),
            converter: FrameConverter::new(options.pixel_format()),
        })
    }

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Packet, LibraryError> {
        let mut packet = Packet::empty();
        packet.read(&mut self.input)?;
        Ok(packet)
    }

    fn is_target_stream(&self, packet: &Packet) -> bool {
        packet.stream() == self.info.index
    }

    fn seek(&mut self, target_ms: f64) -> Result<(), LibraryError> {
        if let Some(session) = self.session.as_mut() {
            session.flush();
        }

        let timestamp = ms_to_stream_timestamp(target_ms, self.info.time_base);
        let result = unsafe {
            ffmpeg_sys_next::av_seek_frame(
                self.input.as_mut_ptr(),
                self.info.index as i32,
                timestamp,
                AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if result < 0 {
            return Err(FfmpegError::from(result).into());
        }
        Ok(())
    }

    fn open_session(&mut self, allowed: HardwareBackends) -> Result<(), ReelError> {
        self.session = None;

        let stream = self
            .input
            .stream(self.info.index)
            .ok_or(ReelError::NoVideoStream)?;
        let parameters = unsafe { stream.parameters().as_ptr() };
        let time_base = self.info.time_base.into();

        for candidate in available_decoders(Some(&self.info.format), self.codec_id, allowed) {
            match CodecSession::open(&candidate, parameters, time_base) {
                Ok(session) => {
                    match session.device() {
                        Some(device) => log::info!(
                            "Opened hardware decoder {} on {device}",
                            session.codec_name()
                        ),
                        None => log::info!("Opened software decoder {}", session.codec_name()),
                    }
                    self.session = Some(session);
                    return Ok(());
                }
                Err(reason) => {
                    let device = candidate.device.map_or("software", |device| device.name());
                    log::debug!(
                        "Rejected decoder {} ({device}): {reason}",
                        candidate.codec.name()
                    );
                }
            }
        }

        Err(ReelError::NoDecoderAvailable {
            codec: self.info.codec.clone(),
        })
    }

    fn session_uses_hardware(&self) -> bool {
        self.session.as_ref().is_some_and(CodecSession::uses_hardware)
    }

    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<(), LibraryError> {
        let packet = packet.map_or(ptr::null(), |packet| unsafe { packet.as_ptr() });
        self.session_mut()?.send_packet(packet)?;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<FrameTimestamp, LibraryError> {
        let frame = unsafe { self.working.as_mut_ptr() };
        self.session_mut()?.receive_frame(frame)?;
        Ok(FrameTimestamp {
            best_effort: self.working.timestamp(),
            pts: self.working.pts(),
        })
    }

    fn take_frame(&mut self) -> Result<Pooled<VideoFrame>, LibraryError> {
        let format = AVPixelFormat::from(self.working.format());

        if !is_hardware_pixel_format(format) {
            let mut frame = VideoFrame::empty();
            unsafe { ffmpeg_sys_next::av_frame_move_ref(frame.as_mut_ptr(), self.working.as_mut_ptr()) };
            return Ok(Pooled::detached(frame));
        }

        let mut target = self.transfers.acquire_with(VideoFrame::empty);
        let (width, height) = (self.working.width(), self.working.height());
        let reusable = transfer_format(&self.working)
            .is_some_and(|format| frame_matches(&target, format, width, height));
        if !reusable {
            // Unset frames are allocated by the transfer in the device's layout.
            unsafe { ffmpeg_sys_next::av_frame_unref(target.as_mut_ptr()) };
        }

        let result = unsafe {
            ffmpeg_sys_next::av_hwframe_transfer_data(target.as_mut_ptr(), self.working.as_ptr(), 0)
        };
        if result < 0 {
            unsafe { ffmpeg_sys_next::av_frame_unref(self.working.as_mut_ptr()) };
            return Err(FfmpegError::from(result).into());
        }

        target.set_pts(self.working.pts());
        unsafe { ffmpeg_sys_next::av_frame_unref(self.working.as_mut_ptr()) };
        Ok(target)
    }

    fn present(&mut self, frame: Pooled<VideoFrame>) -> Option<FrameImage> {
        self.converter.convert(frame)
    }
}

/// Host layout a hardware frame downloads to, from its frames context.
fn transfer_format(frame: &VideoFrame) -> Option<Pixel> {
    unsafe {
        let frames_ref = (*frame.as_ptr()).hw_frames_ctx;
        if frames_ref.is_null() {
            return None;
        }
        let frames = (*frames_ref).data as *const ffmpeg_sys_next::AVHWFramesContext;
        Some(Pixel::from((*frames).sw_format))
    }
}
