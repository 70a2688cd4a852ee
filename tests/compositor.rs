mod common;

use common::{BLUE, RED, solid};
use vidcompare::compositor::{
    ComparisonMode, FramePair, MARKER_COLOR, RawFrame, SourceLabels, ViewSettings, blend, compose,
    label_band_height,
};
use vidcompare::geometry::OutputGeometry;

fn pair(geometry: OutputGeometry, a: [u8; 3], b: [u8; 3]) -> FramePair {
    FramePair {
        a: RawFrame::new(geometry, solid(geometry.frame_len(), a)).unwrap(),
        b: RawFrame::new(geometry, solid(geometry.frame_len(), b)).unwrap(),
    }
}

fn pixel(data: &[u8], geometry: OutputGeometry, x: u32, y: u32) -> [u8; 3] {
    let idx = ((y * geometry.width + x) * 3) as usize;
    [data[idx], data[idx + 1], data[idx + 2]]
}

#[test]
fn side_by_side_splits_at_column_with_marker() {
    let geometry = OutputGeometry::new(8, 2);
    let frames = pair(geometry, BLUE, RED);
    let out = blend(ComparisonMode::SideBySide, &frames.a, &frames.b, 3);

    for y in 0..2 {
        for x in 0..3 {
            assert_eq!(pixel(&out.data, geometry, x, y), BLUE);
        }
        assert_eq!(pixel(&out.data, geometry, 3, y), MARKER_COLOR);
        assert_eq!(pixel(&out.data, geometry, 4, y), MARKER_COLOR);
        for x in 5..8 {
            assert_eq!(pixel(&out.data, geometry, x, y), RED);
        }
    }
}

#[test]
fn side_by_side_marker_is_clipped_at_right_edge() {
    let geometry = OutputGeometry::new(4, 1);
    let frames = pair(geometry, BLUE, RED);

    let out = blend(ComparisonMode::SideBySide, &frames.a, &frames.b, 3);
    assert_eq!(pixel(&out.data, geometry, 2, 0), BLUE);
    assert_eq!(pixel(&out.data, geometry, 3, 0), MARKER_COLOR);

    // split past the width clamps to the width: pure A, no marker
    let out = blend(ComparisonMode::SideBySide, &frames.a, &frames.b, 99);
    assert_eq!(out.data, frames.a.data());
}

#[test]
fn overlay_weights_follow_split() {
    let geometry = OutputGeometry::new(4, 1);
    let frames = pair(geometry, [0, 0, 0], [200, 100, 40]);

    let none = blend(ComparisonMode::Overlay, &frames.a, &frames.b, 0);
    assert_eq!(none.data, frames.a.data());
    let full = blend(ComparisonMode::Overlay, &frames.a, &frames.b, 4);
    assert_eq!(full.data, frames.b.data());
    let quarter = blend(ComparisonMode::Overlay, &frames.a, &frames.b, 1);
    assert_eq!(pixel(&quarter.data, geometry, 0, 0), [50, 25, 10]);
}

#[test]
fn difference_is_zero_for_identical_frames() {
    let geometry = OutputGeometry::new(3, 3);
    let frames = pair(geometry, [17, 99, 201], [17, 99, 201]);
    let out = blend(ComparisonMode::Difference, &frames.a, &frames.b, 1);
    assert!(out.data.iter().all(|&v| v == 0));
}

#[test]
fn difference_ignores_split_and_is_symmetric() {
    let geometry = OutputGeometry::new(2, 2);
    let ab = pair(geometry, BLUE, RED);
    let ba = pair(geometry, RED, BLUE);
    let left = blend(ComparisonMode::Difference, &ab.a, &ab.b, 0);
    let right = blend(ComparisonMode::Difference, &ba.a, &ba.b, 2);
    assert_eq!(left, right);
    let [b, g, r] = pixel(&left.data, geometry, 1, 1);
    assert_eq!(b, g);
    assert_eq!(g, r);
    assert!(r > 0);
}

#[test]
fn toggle_switches_at_half_width() {
    let geometry = OutputGeometry::new(10, 1);
    let frames = pair(geometry, BLUE, RED);
    assert_eq!(
        blend(ComparisonMode::Toggle, &frames.a, &frames.b, 4).data,
        frames.a.data()
    );
    assert_eq!(
        blend(ComparisonMode::Toggle, &frames.a, &frames.b, 5).data,
        frames.b.data()
    );
}

#[test]
fn labels_only_touch_the_top_band() {
    let geometry = OutputGeometry::new(320, 180);
    let frames = pair(geometry, BLUE, BLUE);
    let view = ViewSettings {
        mode: ComparisonMode::Overlay,
        split_position: 160,
        labels: Some(SourceLabels {
            a: "left.mp4".into(),
            b: "right.mp4".into(),
        }),
    };
    let out = compose(&frames, &view);

    let band = label_band_height(geometry);
    let row_len = geometry.width as usize * 3;
    let (top, rest) = out.data.split_at(band as usize * row_len);
    assert!(top.chunks_exact(3).any(|p| p != BLUE));
    assert!(rest.chunks_exact(3).all(|p| p == BLUE));
}

#[test]
fn output_matches_geometry_in_every_mode() {
    let geometry = OutputGeometry::new(7, 5);
    let frames = pair(geometry, BLUE, RED);
    for mode in [
        ComparisonMode::SideBySide,
        ComparisonMode::Overlay,
        ComparisonMode::Difference,
        ComparisonMode::Toggle,
    ] {
        let out = blend(mode, &frames.a, &frames.b, 3);
        assert_eq!(out.geometry, geometry);
        assert_eq!(out.data.len(), geometry.frame_len());
    }
}
