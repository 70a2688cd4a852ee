//! Boundary towards whatever displays the composite.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use crate::compositor::ComposedFrame;
use crate::media::TimelineLength;
use crate::snapshot;

/// Receives composited frames and status text.
///
/// Called from the interactive thread and from the playback worker.
pub trait Presenter: Send + Sync {
    fn present(&self, frame: &ComposedFrame);
    fn status(&self, text: &str);
}

/// `MM:SS`; negative or non-finite input renders as `00:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let total = seconds as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn status_line(status: &str, frame: u64, timeline: TimelineLength, fps: f64) -> String {
    let current = format_time(frame as f64 / fps);
    let total = match timeline {
        TimelineLength::Known(len) => format_time(len as f64 / fps),
        TimelineLength::Unknown => "??:??".to_string(),
    };
    format!("{status} | {current} / {total}")
}

const STATUS_HISTORY: usize = 64;

/// Keeps the latest composite in memory, optionally writing every frame to disk.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    latest: Mutex<Option<ComposedFrame>>,
    statuses: Mutex<VecDeque<String>>,
    presented: AtomicU64,
    frames_dir: Option<PathBuf>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            frames_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn latest(&self) -> Option<ComposedFrame> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::SeqCst)
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses
            .lock()
            .ok()
            .and_then(|guard| guard.back().cloned())
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Presenter for FrameRecorder {
    fn present(&self, frame: &ComposedFrame) {
        let index = self.presented.fetch_add(1, Ordering::SeqCst);
        if let Some(dir) = &self.frames_dir {
            let path = dir.join(format!("frame-{index:06}.png"));
            if let Err(err) = snapshot::save_frame(frame, &path) {
                warn!(path = %path.display(), error = %err, "Failed to write frame");
            }
        }
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(frame.clone());
        }
    }

    fn status(&self, text: &str) {
        info!(status = text, "Status");
        if let Ok(mut guard) = self.statuses.lock() {
            if guard.len() == STATUS_HISTORY {
                guard.pop_front();
            }
            guard.push_back(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(61.9), "01:01");
        assert_eq!(format_time(-1.0), "00:00");
        assert_eq!(format_time(f64::INFINITY), "00:00");
    }

    #[test]
    fn status_line_marks_unknown_length() {
        assert_eq!(
            status_line("Playing", 150, TimelineLength::Known(300), 30.0),
            "Playing | 00:05 / 00:10"
        );
        assert_eq!(
            status_line("Paused", 90, TimelineLength::Unknown, 30.0),
            "Paused | 00:03 / ??:??"
        );
    }
}
