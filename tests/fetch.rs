mod common;

use std::path::Path;

use common::{BLUE, FakeBackend, FakeClip, RED};
use vidcompare::compositor::ComparisonMode;
use vidcompare::fetch::{StreamPull, StreamingFetch, fetch_single};
use vidcompare::geometry::{DisplayArea, OutputGeometry};
use vidcompare::media::{SourcePair, resolve_source};
use vidcompare::quality::compute_metrics;
use vidcompare::snapshot::{StillRequest, render_still};

fn pair_from(backend: &FakeBackend) -> SourcePair {
    let a = resolve_source(backend, Path::new("a.mp4")).unwrap();
    let b = resolve_source(backend, Path::new("b.mp4")).unwrap();
    SourcePair::new(a, b)
}

#[test]
fn single_fetch_decodes_both_sources_at_one_geometry() {
    let backend = FakeBackend::new()
        .with_clip("a.mp4", FakeClip::new(64, 36, 30.0, 90, BLUE))
        .with_clip("b.mp4", FakeClip::new(32, 18, 30.0, 90, RED));
    let pair = pair_from(&backend);
    let geometry = OutputGeometry::new(16, 9);

    let frames = fetch_single(&backend, &pair, 15, 15, geometry).unwrap();
    assert_eq!(frames.a.geometry(), geometry);
    assert_eq!(frames.b.geometry(), geometry);
    assert_eq!(&frames.a.data()[..3], &BLUE);
    assert_eq!(&frames.b.data()[..3], &RED);

    let requests = backend.single_requests();
    assert_eq!(requests.len(), 2);
    assert!((requests[0].seek_seconds - 0.5).abs() < 1e-9);
    assert!((requests[1].seek_seconds - 1.0).abs() < 1e-9);
}

#[test]
fn single_fetch_reports_decoder_failure() {
    let backend = FakeBackend::new()
        .with_clip("a.mp4", FakeClip::new(64, 36, 30.0, 90, BLUE))
        .with_clip("b.mp4", FakeClip::new(64, 36, 30.0, 10, RED));
    let pair = pair_from(&backend);
    assert!(fetch_single(&backend, &pair, 50, 0, OutputGeometry::new(16, 9)).is_err());
}

#[test]
fn streaming_fetch_reads_in_lockstep_until_short() {
    let backend = FakeBackend::new()
        .with_clip("a.mp4", FakeClip::new(64, 36, 30.0, 90, BLUE))
        .with_clip("b.mp4", FakeClip::new(64, 36, 30.0, 12, RED));
    let pair = pair_from(&backend);
    let geometry = OutputGeometry::new(16, 9);

    let mut fetch = StreamingFetch::open(&backend, &pair, 10, 0, geometry).unwrap();
    assert_eq!(fetch.geometry(), geometry);
    assert_eq!(backend.stream_requests().len(), 2);

    for _ in 0..2 {
        assert!(fetch.streams_alive());
        assert!(matches!(fetch.pull(), StreamPull::Frames(_)));
    }
    assert!(!fetch.streams_alive());
    match fetch.pull() {
        StreamPull::Short { a, b } => {
            assert_eq!(a, geometry.frame_len());
            assert_eq!(b, 0);
        }
        StreamPull::Frames(_) => panic!("expected a short read"),
    }
}

#[test]
fn still_decodes_one_pair_for_composite_and_metrics() {
    let backend = FakeBackend::new()
        .with_clip("a.mp4", FakeClip::new(64, 36, 30.0, 90, BLUE))
        .with_clip("b.mp4", FakeClip::new(32, 18, 30.0, 90, RED));
    let pair = pair_from(&backend);
    let request = StillRequest {
        frame: 1_000,
        offset_frames: -30,
        mode: ComparisonMode::SideBySide,
        split: Some(10_000),
        area: DisplayArea::new(320, 180),
        show_labels: false,
    };

    let still = render_still(&backend, &pair, &request).unwrap();
    let metrics = compute_metrics(&still.frames).unwrap();

    assert_eq!(still.frame, 89);
    assert_eq!(still.composed.geometry, OutputGeometry::new(320, 180));
    // split clamped to the width leaves pure A
    assert_eq!(still.composed.data, still.frames.a.data());
    assert!(metrics.mse > 0.0);

    let requests = backend.single_requests();
    assert_eq!(requests.len(), 2);
    assert!(backend.stream_requests().is_empty());
    assert!((requests[0].seek_seconds - 89.0 / 30.0).abs() < 1e-9);
    assert!((requests[1].seek_seconds - 59.0 / 30.0).abs() < 1e-9);
}
