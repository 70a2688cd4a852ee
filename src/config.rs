use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compositor::ComparisonMode;
use crate::error::ConfigError;
use crate::geometry::DisplayArea;

pub const FFMPEG_ENV: &str = "VIDCOMPARE_FFMPEG";
pub const FFPROBE_ENV: &str = "VIDCOMPARE_FFPROBE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompareConfig {
    pub backend: BackendConfig,
    pub display: DisplayConfig,
    pub playback: PlaybackConfig,
}

impl CompareConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CompareConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults, then applies environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(FFMPEG_ENV)
            && !value.trim().is_empty()
        {
            self.backend.ffmpeg = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var(FFPROBE_ENV)
            && !value.trim().is_empty()
        {
            self.backend.ffprobe = PathBuf::from(value);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub resize_debounce_ms: u64,
    pub mode: ComparisonMode,
}

impl DisplayConfig {
    pub fn area(&self) -> DisplayArea {
        DisplayArea::new(self.width, self.height)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 675,
            resize_debounce_ms: 300,
            mode: ComparisonMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Consecutive short or empty stream reads tolerated before playback stops.
    pub max_consecutive_failures: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: CompareConfig = serde_yaml::from_str(
            "display:\n  width: 640\n  mode: difference\nplayback:\n  max_consecutive_failures: 3\n",
        )
        .unwrap();
        assert_eq!(config.display.width, 640);
        assert_eq!(config.display.height, 675);
        assert_eq!(config.display.resize_debounce_ms, 300);
        assert_eq!(config.display.mode, ComparisonMode::Difference);
        assert_eq!(config.playback.max_consecutive_failures, 3);
        assert_eq!(config.backend.ffmpeg, PathBuf::from("ffmpeg"));
    }
}
