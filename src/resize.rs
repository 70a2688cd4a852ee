//! Debounced handling of display-area changes.
//!
//! Bursts of resize notifications collapse into one; only the last area is
//! applied once the window has been quiet for the debounce interval.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::geometry::{DisplayArea, OutputGeometry, plan_geometry};
use crate::media::SourcePair;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    window: Duration,
    pending: Option<(DisplayArea, Instant)>,
}

impl Default for ResizeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ResizeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a notification, replacing any pending one and restarting the window.
    pub fn notify(&mut self, area: DisplayArea, now: Instant) {
        debug!(%area, "Resize notification");
        self.pending = Some((area, now));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left until the pending area is due, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, at)| self.window.saturating_sub(now.saturating_duration_since(at)))
    }

    /// Returns the pending area once the window has elapsed, clearing it.
    pub fn poll(&mut self, now: Instant) -> Option<DisplayArea> {
        match self.pending {
            Some((area, at)) if now.saturating_duration_since(at) >= self.window => {
                self.pending = None;
                Some(area)
            }
            _ => None,
        }
    }
}

/// What a settled display area means for the current output geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDecision {
    /// Nothing is loaded yet; only the area is remembered.
    NoSources,
    /// Area is degenerate or a source reports zero dimensions.
    Degenerate,
    /// New geometry is within one pixel of the current one.
    Unchanged,
    Apply(OutputGeometry),
}

pub fn decide(
    pair: Option<&SourcePair>,
    current: OutputGeometry,
    area: DisplayArea,
) -> ResizeDecision {
    let Some(pair) = pair else {
        return ResizeDecision::NoSources;
    };
    match plan_geometry(pair.a.dimensions(), pair.b.dimensions(), area) {
        None => ResizeDecision::Degenerate,
        Some(next) if next.differs_materially(&current) => ResizeDecision::Apply(next),
        Some(_) => ResizeDecision::Unchanged,
    }
}
