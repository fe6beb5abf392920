//! Byte-stream sources for the demuxer.
//!
//! The demuxer never touches files directly. It pulls bytes through a
//! [`ByteSource`], which the FFmpeg backend wires into a custom AVIO
//! context. Any `Read + Seek` type can be used through [`ReaderSource`].
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use reelthread::byte_source::{ByteSource, ReaderSource, SeekOrigin, resolve_seek};
//!
//! let mut source = ReaderSource::new(Cursor::new(vec![0u8; 100]))?;
//! assert_eq!(resolve_seek(&mut source, 10, SeekOrigin::Start)?, 10);
//! // Size queries report the length without moving the read position.
//! assert_eq!(resolve_seek(&mut source, 0, SeekOrigin::Size)?, 100);
//! assert_eq!(source.position(), 10);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::fs::File;
use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Seek, SeekFrom};
use std::path::Path;

/// A blocking, seekable byte stream.
///
/// Used only from the decode thread.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means no more data.
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize>;

    /// Move the read position to `position` bytes from the start.
    fn seek(&mut self, position: u64) -> IoResult<()>;

    /// Move the read position to `offset` bytes relative to the end.
    fn seek_end(&mut self, offset: i64) -> IoResult<()>;

    /// Current read position in bytes from the start.
    fn position(&self) -> u64;

    /// Total length of the stream in bytes.
    fn length(&self) -> u64;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, position: u64) -> IoResult<()> {
        (**self).seek(position)
    }

    fn seek_end(&mut self, offset: i64) -> IoResult<()> {
        (**self).seek_end(offset)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn length(&self) -> u64 {
        (**self).length()
    }
}

/// Adapts any `Read + Seek` value into a [`ByteSource`].
///
/// The length is measured once at construction.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    position: u64,
    length: u64,
}

impl<R: Read + Seek + Send> ReaderSource<R> {
    /// Wrap `reader`, measuring its length and rewinding it to the start.
    pub fn new(mut reader: R) -> IoResult<Self> {
        let length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            position: 0,
            length,
        })
    }

    /// Give back the wrapped reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderSource<File> {
    /// Open a file as a byte source.
    pub fn open<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek + Send> ByteSource for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let read = self.reader.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }

    fn seek(&mut self, position: u64) -> IoResult<()> {
        self.position = self.reader.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn seek_end(&mut self, offset: i64) -> IoResult<()> {
        self.position = self.reader.seek(SeekFrom::End(offset))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.length
    }
}

/// Reference point of a demuxer seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Absolute offset from the start.
    Start,
    /// Offset from the current position.
    Current,
    /// Offset from the end.
    End,
    /// Report the total length; the offset is ignored.
    Size,
}

impl SeekOrigin {
    /// Decode an AVIO `whence` value. `AVSEEK_FORCE` is ignored.
    pub fn from_whence(whence: i32) -> Option<Self> {
        let force = ffmpeg_sys_next::AVSEEK_FORCE as i32;
        match whence & !force {
            libc::SEEK_SET => Some(SeekOrigin::Start),
            libc::SEEK_CUR => Some(SeekOrigin::Current),
            libc::SEEK_END => Some(SeekOrigin::End),
            w if w == ffmpeg_sys_next::AVSEEK_SIZE as i32 => Some(SeekOrigin::Size),
            _ => None,
        }
    }
}

/// Apply a demuxer seek request to `source`.
///
/// Returns the new read position, or the total length for
/// [`SeekOrigin::Size`], which leaves the read position untouched.
pub fn resolve_seek<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: i64,
    origin: SeekOrigin,
) -> IoResult<i64> {
    match origin {
        SeekOrigin::Size => return Ok(source.length() as i64),
        SeekOrigin::Start => source.seek(non_negative(offset)?)?,
        SeekOrigin::Current => {
            let target = source.position() as i64 + offset;
            source.seek(non_negative(target)?)?;
        }
        SeekOrigin::End => source.seek_end(offset)?,
    }
    Ok(source.position() as i64)
}

fn non_negative(position: i64) -> IoResult<u64> {
    u64::try_from(position).map_err(|_| {
        IoError::new(
            ErrorKind::InvalidInput,
            format!("seek to negative position {position}"),
        )
    })
}
