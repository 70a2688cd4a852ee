use std::fs;

use tempfile::tempdir;
use vidcompare::compositor::ComparisonMode;
use vidcompare::config::CompareConfig;
use vidcompare::error::ConfigError;
use vidcompare::geometry::DisplayArea;
use vidcompare::validation::validate_config;

#[test]
fn loads_yaml_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vidcompare.yaml");
    fs::write(
        &path,
        "backend:\n  ffmpeg: /opt/ffmpeg/bin/ffmpeg\ndisplay:\n  width: 800\n  height: 450\n  mode: overlay\n",
    )
    .unwrap();

    let config = CompareConfig::load(&path).unwrap();
    assert_eq!(config.backend.ffmpeg.to_str(), Some("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(config.backend.ffprobe.to_str(), Some("ffprobe"));
    assert_eq!(config.display.area(), DisplayArea::new(800, 450));
    assert_eq!(config.display.mode, ComparisonMode::Overlay);
    assert_eq!(config.playback.max_consecutive_failures, 10);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempdir().unwrap();
    let err = CompareConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "display:\n  width: wide\n").unwrap();
    let err = CompareConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn zero_area_fails_validation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zero.yaml");
    fs::write(&path, "display:\n  width: 0\n").unwrap();
    let config = CompareConfig::load(&path).unwrap();
    let report = validate_config(&config);
    assert!(!report.is_ok());
    assert!(report.errors[0].contains("0x675"));
}
