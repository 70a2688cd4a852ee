//! Source metadata and the shared timeline of a loaded pair.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{DecodeBackend, ProbeReport};
use crate::error::SourceLoadError;

/// Frame rate used whenever the reported rate cannot be parsed.
pub const FALLBACK_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceSlot {
    A,
    B,
}

impl fmt::Display for SourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSlot::A => f.write_str("A"),
            SourceSlot::B => f.write_str("B"),
        }
    }
}

/// One resolved input. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSource {
    pub path: PathBuf,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration_seconds: f64,
    /// `floor(frame_rate * duration)`; zero or negative means unknown.
    pub frame_count: i64,
}

impl MediaSource {
    pub fn from_probe(path: &Path, report: &ProbeReport) -> Result<Self, SourceLoadError> {
        let stream = report
            .streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| SourceLoadError::NoVideoStream {
                path: path.to_path_buf(),
            })?;

        let (Some(width), Some(height)) = (stream.width, stream.height) else {
            return Err(SourceLoadError::MissingDimensions {
                path: path.to_path_buf(),
            });
        };
        if width == 0 || height == 0 {
            return Err(SourceLoadError::MissingDimensions {
                path: path.to_path_buf(),
            });
        }

        let frame_rate = stream
            .frame_rate
            .as_deref()
            .map(parse_frame_rate)
            .unwrap_or(FALLBACK_FRAME_RATE);
        let duration_seconds = stream
            .duration
            .as_deref()
            .and_then(parse_seconds)
            .or_else(|| report.format_duration.as_deref().and_then(parse_seconds))
            .unwrap_or_else(|| {
                debug!(path = %path.display(), "Duration unavailable; timeline length unknown");
                0.0
            });
        let frame_count = (frame_rate * duration_seconds).floor() as i64;

        Ok(Self {
            path: path.to_path_buf(),
            label: display_label(path),
            width,
            height,
            frame_rate,
            duration_seconds,
            frame_count,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Probes `path` through `backend` and resolves it into a [`MediaSource`].
pub fn resolve_source(
    backend: &dyn DecodeBackend,
    path: &Path,
) -> Result<MediaSource, SourceLoadError> {
    let report = backend.probe(path)?;
    let source = MediaSource::from_probe(path, &report)?;
    info!(
        path = %path.display(),
        width = source.width,
        height = source.height,
        fps = source.frame_rate,
        frames = source.frame_count,
        "Source resolved"
    );
    Ok(source)
}

/// Parses `num/den` or a decimal string. Anything unusable yields 30 fps.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let rate = rate.trim();
    let parsed = match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => Some(num / den),
            _ => None,
        },
        None => rate.parse::<f64>().ok(),
    };
    match parsed {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => {
            debug!(rate, "Unparseable frame rate; using fallback");
            FALLBACK_FRAME_RATE
        }
    }
}

fn parse_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite())
}

fn display_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimelineLength {
    Known(u64),
    /// Open-ended until playback reaches the end of a stream.
    Unknown,
}

impl TimelineLength {
    pub fn from_counts(a: i64, b: i64) -> Self {
        if a > 0 && b > 0 {
            TimelineLength::Known(a.min(b) as u64)
        } else {
            TimelineLength::Unknown
        }
    }

    pub fn frames(&self) -> Option<u64> {
        match self {
            TimelineLength::Known(len) => Some(*len),
            TimelineLength::Unknown => None,
        }
    }

    /// Clamps a requested frame into `0..len` (or `0..` when unknown).
    pub fn clamp(&self, frame: i64) -> u64 {
        let frame = frame.max(0) as u64;
        match self {
            TimelineLength::Known(len) => frame.min(len.saturating_sub(1)),
            TimelineLength::Unknown => frame,
        }
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.frames().map(|len| len.saturating_sub(1))
    }
}

/// The two live sources and their shared timeline.
#[derive(Debug, Clone, Serialize)]
pub struct SourcePair {
    pub a: MediaSource,
    pub b: MediaSource,
    pub timeline: TimelineLength,
}

impl SourcePair {
    pub fn new(a: MediaSource, b: MediaSource) -> Self {
        let timeline = TimelineLength::from_counts(a.frame_count, b.frame_count);
        Self { a, b, timeline }
    }

    /// Mean of both rates; only used for pacing and time display.
    pub fn shared_frame_rate(&self) -> f64 {
        (self.a.frame_rate + self.b.frame_rate) / 2.0
    }

    /// Fixes an unknown timeline once playback has reached `reached`.
    pub fn finalize_length(&mut self, reached: u64) {
        if self.timeline == TimelineLength::Unknown {
            self.timeline = TimelineLength::Known(reached + 1);
            info!(frames = reached + 1, "Timeline length finalized");
        }
    }
}
