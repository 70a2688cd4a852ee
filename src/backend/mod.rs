//! Decoding backend contract.
//!
//! Everything that actually turns a file into pixels lives behind
//! [`DecodeBackend`]; the rest of the crate only sees BGR24 byte buffers of the
//! requested geometry.

pub mod ffmpeg;

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FetchError, SourceLoadError};
use crate::geometry::OutputGeometry;

pub use ffmpeg::FfmpegBackend;

/// One stream entry as reported by the backend's metadata probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Rational (`30000/1001`) or decimal (`29.97`) string.
    pub frame_rate: Option<String>,
    /// Seconds as a decimal string.
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub streams: Vec<StreamInfo>,
    pub format_duration: Option<String>,
}

/// "Open `path`, seek to `seek_seconds`, emit frames scaled to `geometry`."
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub path: PathBuf,
    pub seek_seconds: f64,
    pub geometry: OutputGeometry,
}

/// A long-lived decode session emitting consecutive frames.
///
/// Implementations release their underlying resources on drop.
pub trait FrameStream: Send {
    /// Reads up to `buf.len()` bytes, blocking until the buffer is full or the
    /// input ends. Returns the number of bytes written; `0` means end of input.
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn is_alive(&mut self) -> bool;
}

pub trait DecodeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self, path: &Path) -> Result<ProbeReport, SourceLoadError>;

    /// Decodes exactly one frame of `request.geometry.frame_len()` bytes.
    fn decode_frame(&self, request: &DecodeRequest) -> Result<Vec<u8>, FetchError>;

    fn open_stream(&self, request: &DecodeRequest) -> Result<Box<dyn FrameStream>, FetchError>;
}
