//! ByteSource, ReaderSource and demuxer seek resolution tests.

use std::io::{Cursor, ErrorKind, Write};

use reelthread::byte_source::{ByteSource, ReaderSource, SeekOrigin, resolve_seek};

fn source(len: usize) -> ReaderSource<Cursor<Vec<u8>>> {
    let bytes = (0..len).map(|i| (i % 251) as u8).collect();
    ReaderSource::new(Cursor::new(bytes)).expect("Failed to wrap cursor")
}

// ── ReaderSource ───────────────────────────────────────────────────

#[test]
fn reader_source_measures_length_and_rewinds() {
    let mut cursor = Cursor::new(vec![1_u8; 64]);
    cursor.set_position(40);

    let source = ReaderSource::new(cursor).expect("Failed to wrap cursor");
    assert_eq!(source.length(), 64);
    assert_eq!(source.position(), 0);
}

#[test]
fn reads_advance_position() {
    let mut source = source(100);
    let mut buf = [0_u8; 30];

    assert_eq!(source.read(&mut buf).expect("read"), 30);
    assert_eq!(source.position(), 30);
    assert_eq!(buf[29], 29);
}

#[test]
fn read_at_end_returns_zero() {
    let mut source = source(10);
    source.seek(10).expect("seek");

    let mut buf = [0_u8; 8];
    assert_eq!(source.read(&mut buf).expect("read"), 0);
    assert_eq!(source.position(), 10);
}

#[test]
fn seek_end_is_relative_to_length() {
    let mut source = source(100);
    source.seek_end(-10).expect("seek_end");
    assert_eq!(source.position(), 90);

    let mut buf = [0_u8; 4];
    source.read(&mut buf).expect("read");
    assert_eq!(buf[0], 90);
}

#[test]
fn boxed_sources_delegate() {
    let mut boxed: Box<dyn ByteSource> = Box::new(source(50));
    boxed.seek(20).expect("seek");
    assert_eq!(boxed.position(), 20);
    assert_eq!(boxed.length(), 50);
}

#[test]
fn file_sources_read_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"reelthread").expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");

    let mut source = ReaderSource::open(file.path()).expect("Failed to open temp file");
    assert_eq!(source.length(), 10);

    let mut buf = [0_u8; 4];
    source.seek(4).expect("seek");
    source.read(&mut buf).expect("read");
    assert_eq!(&buf, b"thre");
}

#[test]
fn missing_file_is_an_error() {
    let result = ReaderSource::open("tests/fixtures/does_not_exist.mp4");
    assert_eq!(result.err().map(|error| error.kind()), Some(ErrorKind::NotFound));
}

#[test]
fn into_inner_returns_reader() {
    let source = source(8);
    assert_eq!(source.into_inner().get_ref().len(), 8);
}

// ── resolve_seek ───────────────────────────────────────────────────

#[test]
fn resolve_seek_from_start() {
    let mut source = source(100);
    assert_eq!(resolve_seek(&mut source, 42, SeekOrigin::Start).expect("seek"), 42);
    assert_eq!(source.position(), 42);
}

#[test]
fn resolve_seek_from_current() {
    let mut source = source(100);
    source.seek(30).expect("seek");

    assert_eq!(resolve_seek(&mut source, 15, SeekOrigin::Current).expect("seek"), 45);
    assert_eq!(resolve_seek(&mut source, -20, SeekOrigin::Current).expect("seek"), 25);
}

#[test]
fn resolve_seek_from_end() {
    let mut source = source(100);
    assert_eq!(resolve_seek(&mut source, -1, SeekOrigin::End).expect("seek"), 99);
}

#[test]
fn resolve_seek_size_keeps_position() {
    let mut source = source(100);
    source.seek(12).expect("seek");

    assert_eq!(resolve_seek(&mut source, 9999, SeekOrigin::Size).expect("size"), 100);
    assert_eq!(source.position(), 12);
}

#[test]
fn resolve_seek_rejects_negative_targets() {
    let mut source = source(100);
    source.seek(5).expect("seek");

    let error = resolve_seek(&mut source, -10, SeekOrigin::Current).expect_err("negative target");
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
    assert_eq!(source.position(), 5);

    let error = resolve_seek(&mut source, -1, SeekOrigin::Start).expect_err("negative target");
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
}

// ── SeekOrigin ─────────────────────────────────────────────────────

#[test]
fn origin_from_whence() {
    assert_eq!(SeekOrigin::from_whence(libc::SEEK_SET), Some(SeekOrigin::Start));
    assert_eq!(SeekOrigin::from_whence(libc::SEEK_CUR), Some(SeekOrigin::Current));
    assert_eq!(SeekOrigin::from_whence(libc::SEEK_END), Some(SeekOrigin::End));
    assert_eq!(
        SeekOrigin::from_whence(ffmpeg_sys_next::AVSEEK_SIZE as i32),
        Some(SeekOrigin::Size)
    );
}

#[test]
fn origin_ignores_force_flag() {
    let force = ffmpeg_sys_next::AVSEEK_FORCE as i32;
    assert_eq!(SeekOrigin::from_whence(libc::SEEK_SET | force), Some(SeekOrigin::Start));
    assert_eq!(SeekOrigin::from_whence(libc::SEEK_END | force), Some(SeekOrigin::End));
}

#[test]
fn origin_rejects_unknown_whence() {
    assert_eq!(SeekOrigin::from_whence(7), None);
}
