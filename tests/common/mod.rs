#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use vidcompare::backend::{DecodeBackend, DecodeRequest, FrameStream, ProbeReport, StreamInfo};
use vidcompare::error::{FetchError, SourceLoadError};
use vidcompare::playback::{Player, PlayerOptions};
use vidcompare::presentation::FrameRecorder;
use vidcompare::geometry::DisplayArea;

pub const BLUE: [u8; 3] = [255, 0, 0];
pub const RED: [u8; 3] = [0, 0, 255];

/// Scripted clip: a solid BGR colour for `frames` frames.
#[derive(Debug, Clone)]
pub struct FakeClip {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
    pub color: [u8; 3],
    /// Leave duration out of the probe so the length is unknown.
    pub hide_duration: bool,
    /// Streams stay alive but never deliver a byte.
    pub stall: bool,
}

impl FakeClip {
    pub fn new(width: u32, height: u32, fps: f64, frames: u64, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            fps,
            frames,
            color,
            hide_duration: false,
            stall: false,
        }
    }

    pub fn unknown_length(mut self) -> Self {
        self.hide_duration = true;
        self
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    fn index_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.fps).round() as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Single(DecodeRequest),
    Stream(DecodeRequest),
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    clips: HashMap<PathBuf, FakeClip>,
    log: Mutex<Vec<Recorded>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip(mut self, path: impl Into<PathBuf>, clip: FakeClip) -> Self {
        self.clips.insert(path.into(), clip);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn single_requests(&self) -> Vec<DecodeRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Single(req) => Some(req),
                Recorded::Stream(_) => None,
            })
            .collect()
    }

    pub fn stream_requests(&self) -> Vec<DecodeRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Stream(req) => Some(req),
                Recorded::Single(_) => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    fn clip(&self, path: &Path) -> Result<&FakeClip, FetchError> {
        self.clips
            .get(path)
            .ok_or_else(|| FetchError::Decode(format!("no clip at {}", path.display())))
    }
}

impl DecodeBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn probe(&self, path: &Path) -> Result<ProbeReport, SourceLoadError> {
        let clip = self.clips.get(path).ok_or_else(|| SourceLoadError::Unreadable {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        })?;
        let duration = (!clip.hide_duration).then(|| format!("{:.6}", clip.frames as f64 / clip.fps));
        Ok(ProbeReport {
            streams: vec![StreamInfo {
                codec_type: Some("video".into()),
                width: Some(clip.width),
                height: Some(clip.height),
                frame_rate: Some(clip.fps.to_string()),
                duration,
            }],
            format_duration: None,
        })
    }

    fn decode_frame(&self, request: &DecodeRequest) -> Result<Vec<u8>, FetchError> {
        self.log.lock().unwrap().push(Recorded::Single(request.clone()));
        let clip = self.clip(&request.path)?;
        if clip.index_at(request.seek_seconds) >= clip.frames {
            return Err(FetchError::Decode("seek past end of clip".into()));
        }
        Ok(solid(request.geometry.frame_len(), clip.color))
    }

    fn open_stream(&self, request: &DecodeRequest) -> Result<Box<dyn FrameStream>, FetchError> {
        self.log.lock().unwrap().push(Recorded::Stream(request.clone()));
        let clip = self.clip(&request.path)?;
        let remaining = clip.frames.saturating_sub(clip.index_at(request.seek_seconds));
        Ok(Box::new(FakeStream {
            remaining,
            color: clip.color,
            stall: clip.stall,
        }))
    }
}

struct FakeStream {
    remaining: u64,
    color: [u8; 3],
    stall: bool,
}

impl FrameStream for FakeStream {
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.stall || self.remaining == 0 {
            return Ok(0);
        }
        self.remaining -= 1;
        for pixel in buf.chunks_exact_mut(3) {
            pixel.copy_from_slice(&self.color);
        }
        Ok(buf.len())
    }

    fn is_alive(&mut self) -> bool {
        self.stall || self.remaining > 0
    }
}

pub fn solid(len: usize, color: [u8; 3]) -> Vec<u8> {
    color.iter().copied().cycle().take(len).collect()
}

/// Player over the fake backend with a small display area.
pub fn player_with(backend: &Arc<FakeBackend>) -> (Player, Arc<FrameRecorder>) {
    let recorder = Arc::new(FrameRecorder::new());
    let options = PlayerOptions {
        area: DisplayArea::new(320, 180),
        ..PlayerOptions::default()
    };
    let player = Player::new(backend.clone(), recorder.clone(), options);
    (player, recorder)
}
