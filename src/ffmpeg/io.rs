//! Custom AVIO context over a [`ByteSource`].

use std::os::raw::{c_int, c_void};
use std::ptr;

use ffmpeg_sys_next::{AVERROR_EOF, AVIOContext};

use crate::byte_source::{ByteSource, SeekOrigin, resolve_seek};
use crate::error::ReelError;

type BoxedSource = Box<dyn ByteSource>;

/// Owns an AVIO context and the byte source its callbacks read from.
///
/// Must outlive the demuxer that reads through it.
pub(crate) struct IoContext {
    context: *mut AVIOContext,
    source: *mut BoxedSource,
}

impl IoContext {
    pub(crate) fn new(source: BoxedSource, buffer_size: usize) -> Result<Self, ReelError> {
        let buffer_size = c_int::try_from(buffer_size).unwrap_or(c_int::MAX);
        let source = Box::into_raw(Box::new(source));

        let buffer = unsafe { ffmpeg_sys_next::av_malloc(buffer_size as usize) } as *mut u8;
        if buffer.is_null() {
            drop(unsafe { Box::from_raw(source) });
            return Err(ReelError::SourceOpen("Failed to allocate I/O buffer".to_string()));
        }

        let context = unsafe {
            ffmpeg_sys_next::avio_alloc_context(
                buffer,
                buffer_size,
                0,
                source as *mut c_void,
                Some(read_packet),
                None,
                Some(seek_stream),
            )
        };
        if context.is_null() {
            unsafe {
                let mut buffer = buffer as *mut c_void;
                ffmpeg_sys_next::av_freep(&mut buffer as *mut *mut c_void as *mut c_void);
                drop(Box::from_raw(source));
            }
            return Err(ReelError::SourceOpen("Failed to allocate I/O context".to_string()));
        }

        Ok(Self { context, source })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut AVIOContext {
        self.context
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        unsafe {
            if !self.context.is_null() {
                // The demuxer may have swapped the buffer, so free whatever it
                // points at now.
                ffmpeg_sys_next::av_freep(&mut (*self.context).buffer as *mut *mut u8 as *mut c_void);
                ffmpeg_sys_next::avio_context_free(&mut self.context);
            }
            if !self.source.is_null() {
                drop(Box::from_raw(self.source));
                self.source = ptr::null_mut();
            }
        }
    }
}

unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    if opaque.is_null() || buf.is_null() || buf_size <= 0 {
        return AVERROR_EOF;
    }

    let source = unsafe { &mut *(opaque as *mut BoxedSource) };
    let buffer = unsafe { std::slice::from_raw_parts_mut(buf, buf_size as usize) };
    match source.read(buffer) {
        Ok(0) => AVERROR_EOF,
        Ok(read) => read as c_int,
        Err(error) => {
            log::warn!("Byte source read failed: {error}");
            -libc::EIO
        }
    }
}

unsafe extern "C" fn seek_stream(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    if opaque.is_null() {
        return -1;
    }

    let source = unsafe { &mut *(opaque as *mut BoxedSource) };
    let Some(origin) = SeekOrigin::from_whence(whence) else {
        return -1;
    };

    match resolve_seek(source, offset, origin) {
        Ok(position) => position,
        Err(error) => {
            log::debug!("Byte source seek to {offset} ({origin:?}) failed: {error}");
            -1
        }
    }
}
