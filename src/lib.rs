pub mod backend;
pub mod compositor;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod media;
pub mod observability;
pub mod playback;
pub mod presentation;
pub mod quality;
pub mod resize;
pub mod snapshot;
pub mod validation;

pub use backend::{DecodeBackend, FfmpegBackend};
pub use compositor::{ComparisonMode, ComposedFrame, FramePair, ViewSettings, compose};
pub use config::CompareConfig;
pub use geometry::{DisplayArea, OutputGeometry};
pub use media::{MediaSource, SourcePair, SourceSlot, TimelineLength};
pub use playback::{PlaybackState, Player, PlayerOptions, PlayerPhase};
