//! Shared helpers for integration tests.
//!
//! [`ScriptedBackend`] stands in for FFmpeg so the decode loop, hardware
//! fallback and playback clock can be exercised deterministically. It
//! simulates a stream of `frame_count` frames, `frame_ms` apart, with a
//! keyframe every `keyframe_interval` frames and a decoder that holds back
//! `latency` frames until more input (or a flush) arrives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reelthread::selector::rank_candidates;
use reelthread::{
    DecoderOptions, DeviceKind, FramePool, FrameImage, FrameTimestamp, HardwareBackends,
    LibraryError, MediaBackend, PixelFormat, Rational, ReelError, StreamInfo,
};

pub fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

/// `true` when the fixture exists; tests needing it return early otherwise.
pub fn fixture_available(path: &str) -> bool {
    Path::new(path).exists()
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// What the scripted backend observed, shared with the test.
#[derive(Debug, Default)]
pub struct Record {
    /// Allowed set passed to each `open_session` call.
    pub session_requests: Vec<HardwareBackends>,
    /// Device of each session that opened (`None` = software).
    pub opened: Vec<Option<DeviceKind>>,
    /// Targets of each seek, in order.
    pub seeks: Vec<f64>,
    /// Packets submitted (excluding flushes).
    pub packets_sent: usize,
    /// Flush (end of input) submissions, accepted or not.
    pub flushes: usize,
}

/// Configuration and shared record for one scripted source.
#[derive(Clone)]
pub struct Script {
    pub frame_count: usize,
    pub frame_ms: i64,
    pub keyframe_interval: usize,
    pub latency: usize,
    /// Registered decoder implementations and the devices each supports.
    pub implementations: Vec<(&'static str, Vec<DeviceKind>)>,
    /// Device kinds that actually open on this "machine".
    pub working_devices: Vec<DeviceKind>,
    pub software_opens: bool,
    pub fail_prepare: bool,
    /// Every seek fails, as on a pipe or socket.
    pub unseekable: bool,
    /// Send failures, keyed by packet index; each fires once.
    pub send_failures: Arc<Mutex<Vec<(usize, LibraryError)>>>,
    pub record: Arc<Mutex<Record>>,
    pub images: FramePool<Vec<u8>>,
}

impl Script {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            frame_ms: 40,
            keyframe_interval: 5,
            latency: 2,
            implementations: vec![("h264", Vec::new())],
            working_devices: Vec::new(),
            software_opens: true,
            fail_prepare: false,
            unseekable: false,
            send_failures: Arc::new(Mutex::new(Vec::new())),
            record: Arc::new(Mutex::new(Record::default())),
            images: FramePool::new(),
        }
    }

    pub fn with_implementations(mut self, implementations: Vec<(&'static str, Vec<DeviceKind>)>) -> Self {
        self.implementations = implementations;
        self
    }

    pub fn with_working_devices(mut self, devices: Vec<DeviceKind>) -> Self {
        self.working_devices = devices;
        self
    }

    pub fn with_send_failure(self, packet: usize, error: LibraryError) -> Self {
        self.send_failures.lock().push((packet, error));
        self
    }

    pub fn duration_ms(&self) -> f64 {
        (self.frame_count as i64 * self.frame_ms) as f64
    }

    pub fn last_frame_ms(&self) -> f64 {
        ((self.frame_count as i64 - 1) * self.frame_ms) as f64
    }
}

/// A [`MediaBackend`] driven by a [`Script`].
pub struct ScriptedBackend {
    script: Script,
    info: StreamInfo,
    cursor: usize,
    pipeline: VecDeque<usize>,
    ready: VecDeque<usize>,
    flushing: bool,
    current: Option<usize>,
    session: Option<Option<DeviceKind>>,
    pixel_format: PixelFormat,
}

impl ScriptedBackend {
    fn frame_time(&self, index: usize) -> i64 {
        index as i64 * self.script.frame_ms
    }
}

impl MediaBackend for ScriptedBackend {
    type Source = Script;
    type Packet = usize;
    type Frame = usize;

    fn prepare(script: Script, options: &DecoderOptions) -> Result<Self, ReelError> {
        if script.fail_prepare {
            return Err(ReelError::SourceOpen("scripted open failure".to_string()));
        }

        let info = StreamInfo {
            index: 0,
            time_base: Rational::new(1, 1000),
            start_time: 0,
            duration_ms: script.duration_ms(),
            codec: "h264".to_string(),
            format: "scripted".to_string(),
        };

        Ok(Self {
            script,
            info,
            cursor: 0,
            pipeline: VecDeque::new(),
            ready: VecDeque::new(),
            flushing: false,
            current: None,
            session: None,
            pixel_format: options.pixel_format(),
        })
    }

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<usize, LibraryError> {
        if self.cursor >= self.script.frame_count {
            return Err(LibraryError::EndOfStream);
        }
        let packet = self.cursor;
        self.cursor += 1;
        Ok(packet)
    }

    fn is_target_stream(&self, _packet: &usize) -> bool {
        true
    }

    fn seek(&mut self, target_ms: f64) -> Result<(), LibraryError> {
        self.script.record.lock().seeks.push(target_ms);
        if self.script.unseekable {
            return Err(LibraryError::Other("source is not seekable".to_string()));
        }

        let index = (target_ms.max(0.0) as i64 / self.script.frame_ms) as usize;
        let index = index.min(self.script.frame_count.saturating_sub(1));
        self.cursor = index / self.script.keyframe_interval * self.script.keyframe_interval;
        self.pipeline.clear();
        self.ready.clear();
        self.flushing = false;
        Ok(())
    }

    fn open_session(&mut self, allowed: HardwareBackends) -> Result<(), ReelError> {
        self.session = None;
        self.pipeline.clear();
        self.ready.clear();

        let mut record = self.script.record.lock();
        record.session_requests.push(allowed);

        let candidates = rank_candidates(self.script.implementations.clone(), allowed);
        for candidate in candidates {
            let opens = match candidate.device {
                Some(device) => self.script.working_devices.contains(&device),
                None => self.script.software_opens,
            };
            if opens {
                record.opened.push(candidate.device);
                self.session = Some(candidate.device);
                return Ok(());
            }
        }

        Err(ReelError::NoDecoderAvailable {
            codec: self.info.codec.clone(),
        })
    }

    fn session_uses_hardware(&self) -> bool {
        matches!(self.session, Some(Some(_)))
    }

    fn send_packet(&mut self, packet: Option<&usize>) -> Result<(), LibraryError> {
        if self.session.is_none() {
            return Err(LibraryError::Other("no session".to_string()));
        }

        let Some(&packet) = packet else {
            self.script.record.lock().flushes += 1;
            // Like FFmpeg, a second flush without a seek in between is refused.
            if self.flushing {
                return Err(LibraryError::EndOfStream);
            }
            self.flushing = true;
            self.ready.extend(self.pipeline.drain(..));
            return Ok(());
        };

        {
            let mut failures = self.script.send_failures.lock();
            if let Some(position) = failures.iter().position(|(index, _)| *index == packet) {
                let (_, error) = failures.remove(position);
                return Err(error);
            }
        }

        if self.ready.len() >= 2 {
            return Err(LibraryError::TryAgain);
        }

        self.script.record.lock().packets_sent += 1;
        self.pipeline.push_back(packet);
        while self.pipeline.len() > self.script.latency {
            if let Some(frame) = self.pipeline.pop_front() {
                self.ready.push_back(frame);
            }
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<FrameTimestamp, LibraryError> {
        match self.ready.pop_front() {
            Some(frame) => {
                self.current = Some(frame);
                let time = self.frame_time(frame);
                Ok(FrameTimestamp {
                    best_effort: Some(time),
                    pts: Some(time),
                })
            }
            None if self.flushing => Err(LibraryError::EndOfStream),
            None => Err(LibraryError::TryAgain),
        }
    }

    fn take_frame(&mut self) -> Result<usize, LibraryError> {
        self.current
            .take()
            .ok_or_else(|| LibraryError::Other("no frame received".to_string()))
    }

    fn present(&mut self, frame: usize) -> Option<FrameImage> {
        let mut data = self.script.images.acquire();
        data.clear();
        data.resize(self.pixel_format.row_bytes(2) * 2, frame as u8);
        Some(FrameImage::new(2, 2, self.pixel_format, data))
    }
}

/// Options tuned so scripted tests run quickly.
pub fn fast_options() -> DecoderOptions {
    DecoderOptions::new()
        .with_idle_backoff(Duration::from_millis(1))
        .with_end_of_stream_backoff(Duration::from_millis(5))
}
