//! Translates timeline positions into per-source decode requests.
//!
//! Source A is requested at `frame / fps_a`, source B at
//! `(frame + offset) / fps_b`. Single-shot requests return one frame per
//! source; streaming fetches keep one decode session per source open and are
//! read in lockstep.

use tracing::{debug, instrument};

use crate::backend::{DecodeBackend, DecodeRequest, FrameStream};
use crate::compositor::{FramePair, RawFrame};
use crate::error::FetchError;
use crate::geometry::OutputGeometry;
use crate::media::SourcePair;

/// Seek times in seconds for `(A, B)`.
pub fn request_times(frame: u64, offset_frames: i64, fps_a: f64, fps_b: f64) -> (f64, f64) {
    let time_a = frame as f64 / fps_a;
    let shifted = i64::try_from(frame)
        .unwrap_or(i64::MAX)
        .saturating_add(offset_frames);
    let time_b = shifted as f64 / fps_b;
    (time_a, time_b)
}

pub fn plan_requests(
    pair: &SourcePair,
    frame: u64,
    offset_frames: i64,
    geometry: OutputGeometry,
) -> [DecodeRequest; 2] {
    let (time_a, time_b) = request_times(frame, offset_frames, pair.a.frame_rate, pair.b.frame_rate);
    [
        DecodeRequest {
            path: pair.a.path.clone(),
            seek_seconds: time_a,
            geometry,
        },
        DecodeRequest {
            path: pair.b.path.clone(),
            seek_seconds: time_b,
            geometry,
        },
    ]
}

/// Decodes one frame from each source for a paused seek, step, or redraw.
#[instrument(skip(backend, pair))]
pub fn fetch_single(
    backend: &dyn DecodeBackend,
    pair: &SourcePair,
    frame: u64,
    offset_frames: i64,
    geometry: OutputGeometry,
) -> Result<FramePair, FetchError> {
    let [request_a, request_b] = plan_requests(pair, frame, offset_frames, geometry);
    let a = RawFrame::new(geometry, backend.decode_frame(&request_a)?)?;
    let b = RawFrame::new(geometry, backend.decode_frame(&request_b)?)?;
    Ok(FramePair { a, b })
}

/// Result of one lockstep read from both streams.
#[derive(Debug)]
pub enum StreamPull {
    Frames(FramePair),
    /// At least one stream returned a short or empty buffer.
    Short { a: usize, b: usize },
}

/// Both decode sessions of a playback run. Dropping it tears both down.
pub struct StreamingFetch {
    a: Box<dyn FrameStream>,
    b: Box<dyn FrameStream>,
    geometry: OutputGeometry,
}

impl StreamingFetch {
    #[instrument(skip(backend, pair))]
    pub fn open(
        backend: &dyn DecodeBackend,
        pair: &SourcePair,
        frame: u64,
        offset_frames: i64,
        geometry: OutputGeometry,
    ) -> Result<Self, FetchError> {
        let [request_a, request_b] = plan_requests(pair, frame, offset_frames, geometry);
        let a = backend.open_stream(&request_a)?;
        // `a` is dropped (and torn down) if B fails to open
        let b = backend.open_stream(&request_b)?;
        debug!(
            seek_a = request_a.seek_seconds,
            seek_b = request_b.seek_seconds,
            "Streaming fetch opened"
        );
        Ok(Self { a, b, geometry })
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.geometry
    }

    pub fn streams_alive(&mut self) -> bool {
        self.a.is_alive() && self.b.is_alive()
    }

    /// Reads one frame from each stream; both reads happen before returning.
    pub fn pull(&mut self) -> StreamPull {
        let frame_len = self.geometry.frame_len();
        let mut buf_a = vec![0u8; frame_len];
        let mut buf_b = vec![0u8; frame_len];
        let read_a = self.a.read_frame(&mut buf_a).unwrap_or(0);
        let read_b = self.b.read_frame(&mut buf_b).unwrap_or(0);
        if read_a != frame_len || read_b != frame_len {
            return StreamPull::Short {
                a: read_a,
                b: read_b,
            };
        }
        match (
            RawFrame::new(self.geometry, buf_a),
            RawFrame::new(self.geometry, buf_b),
        ) {
            (Ok(a), Ok(b)) => StreamPull::Frames(FramePair { a, b }),
            _ => StreamPull::Short {
                a: read_a,
                b: read_b,
            },
        }
    }
}
