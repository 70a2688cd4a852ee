//! Builds the displayed picture from one frame of each source.

pub mod font;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::geometry::OutputGeometry;

/// Width of the split marker drawn in side-by-side mode, in pixels.
pub const MARKER_WIDTH: u32 = 2;
pub const MARKER_COLOR: [u8; 3] = [0, 255, 0];

const LABEL_MARGIN: i64 = 10;
const LABEL_TOP: i64 = 12;
const LABEL_TEXT: [u8; 3] = [255, 255, 255];
const LABEL_OUTLINE: [u8; 3] = [0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    #[default]
    SideBySide,
    Overlay,
    Difference,
    Toggle,
}

impl ComparisonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMode::SideBySide => "side-by-side",
            ComparisonMode::Overlay => "overlay",
            ComparisonMode::Difference => "difference",
            ComparisonMode::Toggle => "toggle",
        }
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "side-by-side" | "side_by_side" | "split" => Ok(ComparisonMode::SideBySide),
            "2" | "overlay" | "blend" => Ok(ComparisonMode::Overlay),
            "3" | "difference" | "diff" => Ok(ComparisonMode::Difference),
            "4" | "toggle" => Ok(ComparisonMode::Toggle),
            other => Err(format!(
                "unknown comparison mode '{other}' (expected side-by-side, overlay, difference or toggle)"
            )),
        }
    }
}

/// One decoded BGR24 frame of exactly `geometry.frame_len()` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    geometry: OutputGeometry,
    data: Vec<u8>,
}

impl RawFrame {
    pub fn new(geometry: OutputGeometry, data: Vec<u8>) -> Result<Self, FetchError> {
        let expected = geometry.frame_len();
        if data.len() != expected {
            return Err(FetchError::WrongSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.geometry
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePair {
    pub a: RawFrame,
    pub b: RawFrame,
}

/// Output of the compositor, BGR24.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedFrame {
    pub geometry: OutputGeometry,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLabels {
    pub a: String,
    pub b: String,
}

/// Everything besides the frames that decides what gets displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    pub mode: ComparisonMode,
    pub split_position: u32,
    pub labels: Option<SourceLabels>,
}

/// Blends the pair under `view.mode` and stamps the source labels.
pub fn compose(pair: &FramePair, view: &ViewSettings) -> ComposedFrame {
    let mut frame = blend(view.mode, &pair.a, &pair.b, view.split_position);
    if let Some(labels) = &view.labels {
        stamp_labels(&mut frame, labels);
    }
    frame
}

/// Mode dispatch without labels. `split` is clamped to the frame width.
pub fn blend(mode: ComparisonMode, a: &RawFrame, b: &RawFrame, split: u32) -> ComposedFrame {
    debug_assert_eq!(a.geometry, b.geometry, "frames must share one geometry");
    let geometry = a.geometry;
    let split = split.min(geometry.width);
    let data = match mode {
        ComparisonMode::SideBySide => side_by_side(geometry, a.data(), b.data(), split),
        ComparisonMode::Overlay => overlay(geometry, a.data(), b.data(), split),
        ComparisonMode::Difference => difference(a.data(), b.data()),
        ComparisonMode::Toggle => {
            if (split as u64) * 2 < geometry.width as u64 {
                a.data().to_vec()
            } else {
                b.data().to_vec()
            }
        }
    };
    ComposedFrame { geometry, data }
}

fn side_by_side(geometry: OutputGeometry, a: &[u8], b: &[u8], split: u32) -> Vec<u8> {
    let width = geometry.width as usize;
    let split = split as usize;
    let mut out = a.to_vec();
    for row in 0..geometry.height as usize {
        let start = (row * width + split) * 3;
        let end = (row + 1) * width * 3;
        out[start..end].copy_from_slice(&b[start..end]);
    }

    let marker_end = (split + MARKER_WIDTH as usize).min(width);
    for row in 0..geometry.height as usize {
        for col in split..marker_end {
            let idx = (row * width + col) * 3;
            out[idx..idx + 3].copy_from_slice(&MARKER_COLOR);
        }
    }
    out
}

/// Linear blend with weight `split / width` on B, rounded to nearest.
fn overlay(geometry: OutputGeometry, a: &[u8], b: &[u8], split: u32) -> Vec<u8> {
    let total = geometry.width.max(1);
    let weight_b = split;
    let weight_a = total - split;
    a.iter()
        .zip(b)
        .map(|(&pa, &pb)| {
            ((pa as u32 * weight_a + pb as u32 * weight_b + total / 2) / total) as u8
        })
        .collect()
}

/// Absolute per-channel difference reduced to luma and replicated to all channels.
fn difference(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    for (pa, pb) in a.chunks_exact(3).zip(b.chunks_exact(3)) {
        let blue = pa[0].abs_diff(pb[0]) as u32;
        let green = pa[1].abs_diff(pb[1]) as u32;
        let red = pa[2].abs_diff(pb[2]) as u32;
        // BT.601 weights in 14-bit fixed point
        let luma = ((red * 4899 + green * 9617 + blue * 1868 + 8192) >> 14) as u8;
        out.extend_from_slice(&[luma, luma, luma]);
    }
    out
}

/// Writes label A top-left and label B top-right, white over a black outline.
pub fn stamp_labels(frame: &mut ComposedFrame, labels: &SourceLabels) {
    let geometry = frame.geometry;
    let scale = if geometry.height >= 240 { 2 } else { 1 };

    let right_width = font::text_width(&labels.b, scale) as i64;
    let right_x = (geometry.width as i64 - right_width - LABEL_MARGIN).max(0);

    for (text, x) in [(&labels.a, LABEL_MARGIN), (&labels.b, right_x)] {
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1), (1, 1)] {
            font::draw_text(
                &mut frame.data,
                geometry,
                x + dx,
                LABEL_TOP + dy,
                text,
                scale,
                LABEL_OUTLINE,
            );
        }
        font::draw_text(
            &mut frame.data,
            geometry,
            x,
            LABEL_TOP,
            text,
            scale,
            LABEL_TEXT,
        );
    }
}

/// Rows touched by [`stamp_labels`] for a given geometry.
pub fn label_band_height(geometry: OutputGeometry) -> u32 {
    let scale = if geometry.height >= 240 { 2 } else { 1 };
    LABEL_TOP as u32 + font::text_height(scale) + 2
}
