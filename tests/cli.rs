use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("vidcompare")
        .expect("binary present")
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["probe", "frame", "play", "session"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn invalid_config_is_rejected_before_decoding() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("bad.yaml");
    fs::write(&config, "playback:\n  max_consecutive_failures: 0\n").unwrap();

    Command::cargo_bin("vidcompare")
        .expect("binary present")
        .args(["--config"])
        .arg(&config)
        .args(["probe", "whatever.mp4"])
        .assert()
        .failure();
}

#[test]
fn unreadable_config_is_rejected() {
    let temp = tempdir().unwrap();
    Command::cargo_bin("vidcompare")
        .expect("binary present")
        .arg("--config")
        .arg(temp.path().join("nope.yaml"))
        .args(["probe", "whatever.mp4"])
        .assert()
        .failure();
}

#[test]
fn missing_inputs_fail_without_touching_ffmpeg() {
    let temp = tempdir().unwrap();
    let output = Command::cargo_bin("vidcompare")
        .expect("binary present")
        .current_dir(temp.path())
        .env("VIDCOMPARE_FFMPEG", "definitely-not-ffmpeg")
        .args(["frame", "left.mp4", "right.mp4", "--output", "out.png"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("left.mp4"), "{stderr}");
    assert!(!temp.path().join("out.png").exists());
}

#[test]
fn unknown_mode_is_a_usage_error() {
    Command::cargo_bin("vidcompare")
        .expect("binary present")
        .args(["play", "a.mp4", "b.mp4", "--mode", "sepia"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_decoder_tools_end_the_process() {
    let temp = tempdir().unwrap();
    let a = temp.path().join("a.mp4");
    let b = temp.path().join("b.mp4");
    fs::write(&a, b"not really a video").unwrap();
    fs::write(&b, b"not really a video").unwrap();

    let output = Command::cargo_bin("vidcompare")
        .expect("binary present")
        .env("VIDCOMPARE_FFMPEG", temp.path().join("no-ffmpeg"))
        .env("VIDCOMPARE_FFPROBE", temp.path().join("no-ffprobe"))
        .arg("play")
        .arg(&a)
        .arg(&b)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not available"), "{stderr}");
}
