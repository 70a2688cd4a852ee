use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a path into a usable [`crate::media::MediaSource`].
///
/// The previously loaded pair (if any) stays valid when this is returned.
#[derive(Debug, Error)]
pub enum SourceLoadError {
    #[error("no video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },
    #[error("could not determine dimensions for {}", path.display())]
    MissingDimensions { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("probe failed for {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start decoder: {0}")]
    Spawn(#[source] io::Error),
    #[error("decoder failed: {0}")]
    Decode(String),
    #[error("decoder returned {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },
    #[error("no source pair loaded")]
    NoSources,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("nothing has been displayed yet")]
    NothingToSave,
    #[error("unsupported snapshot format for {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config YAML {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
