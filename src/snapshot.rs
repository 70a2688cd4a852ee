use std::path::{Path, PathBuf};

use chrono::Local;
use image::{ImageFormat, RgbImage};
use tracing::info;

use crate::backend::DecodeBackend;
use crate::compositor::{ComparisonMode, ComposedFrame, FramePair, SourceLabels, ViewSettings, compose};
use crate::error::{FetchError, SnapshotError};
use crate::fetch::fetch_single;
use crate::geometry::{DisplayArea, plan_geometry};
use crate::media::SourcePair;

/// A one-off comparison still.
#[derive(Debug, Clone)]
pub struct StillRequest {
    pub frame: u64,
    pub offset_frames: i64,
    pub mode: ComparisonMode,
    /// Centred when unset, otherwise clamped to the output width.
    pub split: Option<i64>,
    pub area: DisplayArea,
    pub show_labels: bool,
}

#[derive(Debug, Clone)]
pub struct Still {
    /// Requested frame after clamping to the timeline.
    pub frame: u64,
    pub frames: FramePair,
    pub composed: ComposedFrame,
}

/// Decodes one frame pair and composes it. The raw pair is kept for quality metrics.
pub fn render_still(
    backend: &dyn DecodeBackend,
    pair: &SourcePair,
    request: &StillRequest,
) -> Result<Still, FetchError> {
    let geometry = plan_geometry(pair.a.dimensions(), pair.b.dimensions(), request.area)
        .unwrap_or_default();
    let frame = pair
        .timeline
        .clamp(i64::try_from(request.frame).unwrap_or(i64::MAX));
    let frames = fetch_single(backend, pair, frame, request.offset_frames, geometry)?;
    let view = ViewSettings {
        mode: request.mode,
        split_position: request.split.map_or(geometry.center_column(), |split| {
            split.clamp(0, geometry.width as i64) as u32
        }),
        labels: request.show_labels.then(|| SourceLabels {
            a: pair.a.label.clone(),
            b: pair.b.label.clone(),
        }),
    };
    let composed = compose(&frames, &view);
    Ok(Still {
        frame,
        frames,
        composed,
    })
}

/// Writes a composite to `path`, picking the encoder from the file extension.
pub fn save_frame(frame: &ComposedFrame, path: &Path) -> Result<(), SnapshotError> {
    let format = ImageFormat::from_path(path).map_err(|_| SnapshotError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::Pnm
    ) {
        return Err(SnapshotError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let image = to_rgb_image(frame).ok_or_else(|| SnapshotError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, format)?;
    Ok(())
}

/// Like [`save_frame`] but logs the destination, for user-requested snapshots.
pub fn save_snapshot(frame: &ComposedFrame, path: &Path) -> Result<(), SnapshotError> {
    save_frame(frame, path)?;
    info!(
        path = %path.display(),
        width = frame.geometry.width,
        height = frame.geometry.height,
        "Snapshot saved"
    );
    Ok(())
}

/// `snapshot-YYYYMMDD-HHMMSS.png` in `dir`.
pub fn default_snapshot_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "snapshot-{}.png",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}

/// BGR24 composite to an RGB image buffer.
pub fn to_rgb_image(frame: &ComposedFrame) -> Option<RgbImage> {
    let mut rgb = Vec::with_capacity(frame.data.len());
    for pixel in frame.data.chunks_exact(3) {
        rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }
    RgbImage::from_raw(frame.geometry.width, frame.geometry.height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::OutputGeometry;

    #[test]
    fn swaps_bgr_to_rgb() {
        let frame = ComposedFrame {
            geometry: OutputGeometry::new(1, 1),
            data: vec![10, 20, 30],
        };
        let image = to_rgb_image(&frame).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn default_name_is_png() {
        let path = default_snapshot_path(Path::new("shots"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(path.starts_with("shots"));
    }
}
