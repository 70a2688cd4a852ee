use serde::Serialize;

use crate::config::CompareConfig;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_config(config: &CompareConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.backend.ffmpeg.as_os_str().is_empty() {
        report.errors.push("backend.ffmpeg cannot be empty".into());
    }
    if config.backend.ffprobe.as_os_str().is_empty() {
        report.errors.push("backend.ffprobe cannot be empty".into());
    }

    report.merge(validate_display(config));

    if config.playback.max_consecutive_failures == 0 {
        report
            .errors
            .push("playback.max_consecutive_failures must be at least 1".into());
    }

    report
}

fn validate_display(config: &CompareConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let display = &config.display;
    if display.width == 0 || display.height == 0 {
        report.errors.push(format!(
            "Display area must be non-empty, got {}x{}",
            display.width, display.height
        ));
    }
    if display.resize_debounce_ms == 0 {
        report.warnings.push(
            "display.resize_debounce_ms is 0; every resize event restarts the decoders".into(),
        );
    }
    report
}
