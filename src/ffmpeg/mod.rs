//! FFmpeg integration.
//!
//! [`FfmpegBackend`] is the production [`MediaBackend`](crate::MediaBackend):
//! it demuxes from a [`ByteSource`](crate::ByteSource) through a custom AVIO
//! context and decodes through the best codec session the selector offers.
//!
//! This module also wraps FFmpeg's log-level API. FFmpeg has its own
//! internal logging, separate from the Rust [`log`] crate; by default it
//! prints warnings and errors to stderr.
//!
//! # Example
//!
//! ```no_run
//! use reelthread::FfmpegLogLevel;
//!
//! // Mirror the Rust log filter.
//! reelthread::set_ffmpeg_log_level(FfmpegLogLevel::from_log_filter(log::max_level()));
//!
//! // Or silence FFmpeg completely.
//! reelthread::set_ffmpeg_log_level(FfmpegLogLevel::Quiet);
//! ```

mod backend;
mod io;
mod session;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;
use log::LevelFilter;

pub use backend::FfmpegBackend;

/// Verbosity of FFmpeg's own stderr output, quietest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    /// FFmpeg's default.
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Each level with its FFmpeg counterpart and canonical name.
const LEVELS: [(FfmpegLogLevel, Level, &str); 9] = [
    (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
    (FfmpegLogLevel::Panic, Level::Panic, "panic"),
    (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
    (FfmpegLogLevel::Error, Level::Error, "error"),
    (FfmpegLogLevel::Warning, Level::Warning, "warning"),
    (FfmpegLogLevel::Info, Level::Info, "info"),
    (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
    (FfmpegLogLevel::Debug, Level::Debug, "debug"),
    (FfmpegLogLevel::Trace, Level::Trace, "trace"),
];

impl FfmpegLogLevel {
    /// The FFmpeg level matching a Rust log filter.
    ///
    /// ```
    /// use log::LevelFilter;
    /// use reelthread::FfmpegLogLevel;
    ///
    /// assert_eq!(FfmpegLogLevel::from_log_filter(LevelFilter::Off), FfmpegLogLevel::Quiet);
    /// assert_eq!(FfmpegLogLevel::from_log_filter(LevelFilter::Warn), FfmpegLogLevel::Warning);
    /// ```
    pub fn from_log_filter(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::Off => FfmpegLogLevel::Quiet,
            LevelFilter::Error => FfmpegLogLevel::Error,
            LevelFilter::Warn => FfmpegLogLevel::Warning,
            LevelFilter::Info => FfmpegLogLevel::Info,
            LevelFilter::Debug => FfmpegLogLevel::Debug,
            LevelFilter::Trace => FfmpegLogLevel::Trace,
        }
    }

    /// Lower-case name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        LEVELS[self as usize].2
    }

    fn to_ffmpeg_level(self) -> Level {
        LEVELS[self as usize].1
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        LEVELS
            .iter()
            .find(|(_, ffmpeg, _)| *ffmpeg == level)
            .map(|(ours, _, _)| *ours)
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        let name = match value.as_str() {
            "off" => "quiet",
            "warn" => "warning",
            other => other,
        };
        LEVELS
            .iter()
            .find(|(_, _, candidate)| *candidate == name)
            .map(|(level, _, _)| *level)
            .ok_or_else(|| format!("unknown FFmpeg log level '{value}'"))
    }
}

/// Limit what FFmpeg itself prints. Rust-side `log` output is unaffected.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// FFmpeg's current level, or `None` for a level set outside this crate
/// that has no variant here.
pub fn ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}
