//! Output geometry shared by both decode requests and the compositor.
//!
//! The wider of the two sources decides the aspect ratio; that ratio is fitted
//! inside the available display area so neither dimension is exceeded.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Space available for the composited picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayArea {
    pub width: u32,
    pub height: u32,
}

impl DisplayArea {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for DisplayArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for DisplayArea {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid width '{w}': {err}"))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid height '{h}': {err}"))?;
        let area = DisplayArea::new(width, height);
        if area.is_empty() {
            return Err(format!("display area must be non-empty, got {area}"));
        }
        Ok(area)
    }
}

/// Resolution every fetch request and the compositor operate at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
}

impl OutputGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of one BGR24 frame at this geometry.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn center_column(&self) -> u32 {
        self.width / 2
    }

    /// Changes of a single pixel come from rounding jitter and are ignored.
    pub fn differs_materially(&self, other: &OutputGeometry) -> bool {
        self.width.abs_diff(other.width) > 1 || self.height.abs_diff(other.height) > 1
    }
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self::new(1200, 675)
    }
}

impl fmt::Display for OutputGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Plans the shared output size for two sources given as `(width, height)`.
///
/// Returns `None` when the area or either source is degenerate.
pub fn plan_geometry(a: (u32, u32), b: (u32, u32), area: DisplayArea) -> Option<OutputGeometry> {
    if area.is_empty() || a.0 == 0 || a.1 == 0 || b.0 == 0 || b.1 == 0 {
        return None;
    }
    let aspect_a = a.0 as f64 / a.1 as f64;
    let aspect_b = b.0 as f64 / b.1 as f64;
    // ties go to source A
    let aspect = if aspect_a >= aspect_b { aspect_a } else { aspect_b };
    Some(fit_aspect(aspect, area))
}

/// Fits `aspect` (width / height) inside `area`.
pub fn fit_aspect(aspect: f64, area: DisplayArea) -> OutputGeometry {
    let area_aspect = area.width as f64 / area.height as f64;
    let (width, height) = if area_aspect >= aspect {
        let width = (area.height as f64 * aspect).round() as u32;
        (width.clamp(1, area.width), area.height)
    } else {
        let height = (area.width as f64 / aspect).round() as u32;
        (area.width, height.clamp(1, area.height))
    };
    OutputGeometry::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_area() {
        assert_eq!(
            "1280x720".parse::<DisplayArea>().unwrap(),
            DisplayArea::new(1280, 720)
        );
        assert!("1280".parse::<DisplayArea>().is_err());
        assert!("0x720".parse::<DisplayArea>().is_err());
    }

    #[test]
    fn planner_fits_wider_aspect_inside_area() {
        let cases = [
            // (a, b, area, expected)
            ((1920, 1080), (1440, 1080), (1200, 675), (1200, 675)),
            ((640, 480), (1280, 544), (800, 800), (800, 340)),
            ((720, 1280), (1280, 720), (500, 500), (500, 281)),
            ((1280, 720), (1280, 720), (1000, 300), (533, 300)),
            ((1280, 720), (1280, 720), (1200, 900), (1200, 675)),
            ((1080, 1920), (720, 1280), (1000, 1000), (563, 1000)),
        ];
        for (a, b, (area_w, area_h), (want_w, want_h)) in cases {
            let area = DisplayArea::new(area_w, area_h);
            let out = plan_geometry(a, b, area).unwrap();
            assert_eq!(out, OutputGeometry::new(want_w, want_h), "{a:?} {b:?} in {area}");
            assert!(out.width <= area.width && out.height <= area.height);

            let aspect = (a.0 as f64 / a.1 as f64).max(b.0 as f64 / b.1 as f64);
            let got = out.width as f64 / out.height as f64;
            assert!((got - aspect).abs() < 0.01, "{out} drifts from {aspect}");
            // one side always fills the area
            assert!(out.width == area.width || out.height == area.height);
        }
    }

    #[test]
    fn fit_aspect_picks_side_by_area_shape() {
        // wider area than content: height fills
        assert_eq!(fit_aspect(2.0, DisplayArea::new(900, 300)), OutputGeometry::new(600, 300));
        // equal shape fills both
        assert_eq!(fit_aspect(2.0, DisplayArea::new(600, 300)), OutputGeometry::new(600, 300));
        // taller area than content: width fills
        assert_eq!(fit_aspect(2.0, DisplayArea::new(600, 900)), OutputGeometry::new(600, 300));
        // extreme aspect never collapses below one pixel
        assert_eq!(fit_aspect(10_000.0, DisplayArea::new(100, 100)), OutputGeometry::new(100, 1));
    }

    #[test]
    fn degenerate_inputs_have_no_plan() {
        let area = DisplayArea::new(800, 450);
        assert_eq!(plan_geometry((0, 720), (1280, 720), area), None);
        assert_eq!(plan_geometry((1280, 720), (1280, 0), area), None);
        assert_eq!(plan_geometry((1280, 720), (1280, 720), DisplayArea::new(0, 450)), None);
    }

    #[test]
    fn jitter_is_not_material() {
        let base = OutputGeometry::new(800, 450);
        assert!(!base.differs_materially(&OutputGeometry::new(801, 449)));
        assert!(base.differs_materially(&OutputGeometry::new(802, 450)));
    }
}
