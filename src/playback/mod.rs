//! Interactive playback state and the commands that drive it.
//!
//! The [`Player`] lives on the interactive thread. Paused seeks, steps and
//! redraws go through a single-shot fetch; continuous playback hands a
//! streaming fetch to a [`worker::PlaybackWorker`]. At most one worker runs
//! at a time, and every restart cancels and joins the previous one first.

pub mod worker;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::backend::DecodeBackend;
use crate::compositor::{ComparisonMode, ComposedFrame, SourceLabels, ViewSettings, compose};
use crate::config::CompareConfig;
use crate::error::{FetchError, SnapshotError, SourceLoadError};
use crate::fetch::{StreamingFetch, fetch_single};
use crate::geometry::{DisplayArea, OutputGeometry, plan_geometry};
use crate::media::{MediaSource, SourcePair, SourceSlot, TimelineLength, resolve_source};
use crate::observability::MetricsCollector;
use crate::presentation::{Presenter, status_line};
use crate::resize::{ResizeDecision, decide};
use crate::snapshot;

pub use worker::{CancelToken, PlaybackOutcome, PlaybackWorker, Termination, WorkerContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerPhase {
    /// Fewer than two sources loaded.
    Idle,
    /// Both sources loaded, frame 0 shown, never played.
    Ready,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub current_frame: u64,
    pub is_playing: bool,
    pub offset_frames: i64,
    pub split_position: u32,
    pub comparison_mode: ComparisonMode,
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub area: DisplayArea,
    pub mode: ComparisonMode,
    pub max_consecutive_failures: u32,
    pub show_labels: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from_config(&CompareConfig::default())
    }
}

impl PlayerOptions {
    pub fn from_config(config: &CompareConfig) -> Self {
        Self {
            area: config.display.area(),
            mode: config.display.mode,
            max_consecutive_failures: config.playback.max_consecutive_failures.max(1),
            show_labels: true,
        }
    }
}

pub struct Player {
    backend: Arc<dyn DecodeBackend>,
    presenter: Arc<dyn Presenter>,
    options: PlayerOptions,
    loaded_a: Option<MediaSource>,
    loaded_b: Option<MediaSource>,
    pair: Option<SourcePair>,
    area: DisplayArea,
    geometry: OutputGeometry,
    state: PlaybackState,
    phase: PlayerPhase,
    view: Arc<Mutex<ViewSettings>>,
    latest: Arc<Mutex<Option<ComposedFrame>>>,
    worker: Option<PlaybackWorker>,
    last_outcome: Option<PlaybackOutcome>,
    fullscreen: bool,
    metrics: MetricsCollector,
    playing_since: Option<Instant>,
}

impl Player {
    pub fn new(
        backend: Arc<dyn DecodeBackend>,
        presenter: Arc<dyn Presenter>,
        options: PlayerOptions,
    ) -> Self {
        let geometry = OutputGeometry::default();
        let state = PlaybackState {
            current_frame: 0,
            is_playing: false,
            offset_frames: 0,
            split_position: geometry.center_column(),
            comparison_mode: options.mode,
        };
        let view = ViewSettings {
            mode: state.comparison_mode,
            split_position: state.split_position,
            labels: None,
        };
        Self {
            backend,
            presenter,
            area: options.area,
            options,
            loaded_a: None,
            loaded_b: None,
            pair: None,
            geometry,
            state,
            phase: PlayerPhase::Idle,
            view: Arc::new(Mutex::new(view)),
            latest: Arc::new(Mutex::new(None)),
            worker: None,
            last_outcome: None,
            fullscreen: false,
            metrics: MetricsCollector::new(),
            playing_since: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// Current state; while playing, the frame index is read from the worker.
    pub fn state(&self) -> PlaybackState {
        let mut state = self.state.clone();
        if let Some(worker) = &self.worker {
            state.current_frame = worker.position();
        }
        state
    }

    pub fn current_frame(&self) -> u64 {
        self.state().current_frame
    }

    pub fn pair(&self) -> Option<&SourcePair> {
        self.pair.as_ref()
    }

    pub fn timeline(&self) -> Option<TimelineLength> {
        self.pair.as_ref().map(|pair| pair.timeline)
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.geometry
    }

    pub fn area(&self) -> DisplayArea {
        self.area
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn last_outcome(&self) -> Option<PlaybackOutcome> {
        self.last_outcome
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn latest_frame(&self) -> Option<ComposedFrame> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }

    /// Resolves `path` into `slot`. A failure leaves the previous sources intact.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn load_source(&mut self, slot: SourceSlot, path: &Path) -> Result<(), SourceLoadError> {
        let source = match resolve_source(self.backend.as_ref(), path) {
            Ok(source) => source,
            Err(err) => {
                warn!(error = %err, "Failed to load video {slot}");
                self.presenter.status(&format!("Error: {err}"));
                return Err(err);
            }
        };

        self.halt();
        match slot {
            SourceSlot::A => self.loaded_a = Some(source),
            SourceSlot::B => self.loaded_b = Some(source),
        }

        match (self.loaded_a.clone(), self.loaded_b.clone()) {
            (Some(a), Some(b)) => self.install_pair(SourcePair::new(a, b)),
            (Some(_), None) => self.presenter.status("Video A loaded. Please load Video B."),
            (None, Some(_)) => self.presenter.status("Video B loaded. Please load Video A."),
            (None, None) => {}
        }
        Ok(())
    }

    pub fn load_pair(&mut self, a: &Path, b: &Path) -> Result<(), SourceLoadError> {
        self.load_source(SourceSlot::A, a)?;
        self.load_source(SourceSlot::B, b)
    }

    fn install_pair(&mut self, pair: SourcePair) {
        self.geometry = plan_geometry(pair.a.dimensions(), pair.b.dimensions(), self.area)
            .unwrap_or_default();
        self.state.current_frame = 0;
        self.state.offset_frames = 0;
        self.state.is_playing = false;
        self.state.split_position = self.geometry.center_column();
        self.last_outcome = None;
        let labels = self.options.show_labels.then(|| SourceLabels {
            a: pair.a.label.clone(),
            b: pair.b.label.clone(),
        });
        info!(
            geometry = %self.geometry,
            timeline = ?pair.timeline,
            fps = pair.shared_frame_rate(),
            "Sources ready"
        );
        self.pair = Some(pair);
        self.phase = PlayerPhase::Ready;
        self.sync_view(labels);

        if self.show_frame().is_ok() {
            self.report("Ready");
        }
    }

    /// Starts continuous playback from the current frame.
    #[instrument(skip(self))]
    pub fn play(&mut self) -> Result<(), FetchError> {
        if self.pair.is_none() {
            return Err(FetchError::NoSources);
        }
        if self.phase == PlayerPhase::Playing {
            return Ok(());
        }
        self.start_worker(self.state.current_frame)?;
        self.report("Playing");
        Ok(())
    }

    /// Stops the worker and keeps the frame it reached.
    pub fn pause(&mut self) -> Option<PlaybackOutcome> {
        let outcome = self.halt()?;
        if !outcome.termination.is_natural_end() {
            self.report("Paused");
        }
        Some(outcome)
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), FetchError> {
        if self.phase == PlayerPhase::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Collects a worker that ended on its own. Call periodically from the interactive loop.
    pub fn poll(&mut self) -> Option<PlaybackOutcome> {
        if !self.worker.as_ref().is_some_and(PlaybackWorker::is_finished) {
            return None;
        }
        let worker = self.worker.take()?;
        let outcome = worker.join();
        self.finish(outcome);
        Some(outcome)
    }

    /// Blocks until the worker ends on its own.
    pub fn wait(&mut self) -> Option<PlaybackOutcome> {
        let worker = self.worker.take()?;
        let outcome = worker.join();
        self.finish(outcome);
        Some(outcome)
    }

    /// Moves to `frame`, clamped to the timeline. Restarts the streams while playing;
    /// once playback has ended on its own the target is shown paused.
    #[instrument(skip(self))]
    pub fn seek(&mut self, frame: i64) -> Result<(), FetchError> {
        if self.pair.is_none() {
            return Err(FetchError::NoSources);
        }

        // Halt before clamping: a natural end may finalize an unknown length.
        let resume = self.phase == PlayerPhase::Playing
            && match self.halt() {
                Some(outcome) if outcome.termination.is_natural_end() => {
                    debug!("Playback ended before the seek landed");
                    false
                }
                Some(_) => true,
                None => false,
            };

        let Some(pair) = &self.pair else {
            return Err(FetchError::NoSources);
        };
        let target = pair.timeline.clamp(frame);
        self.state.current_frame = target;

        if resume {
            self.metrics.record_stream_restart();
            self.start_worker(target)?;
            self.report("Seek");
            return Ok(());
        }

        self.show_frame()?;
        self.report("Seek");
        Ok(())
    }

    pub fn seek_to_start(&mut self) -> Result<(), FetchError> {
        self.seek(0)
    }

    /// Seeks to the last frame; does nothing while the length is unknown.
    pub fn seek_to_end(&mut self) -> Result<bool, FetchError> {
        match self.timeline().and_then(|timeline| timeline.last_frame()) {
            Some(last) => {
                self.seek(last as i64)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Moves by `delta` frames while paused. Out-of-range targets are ignored.
    #[instrument(skip(self))]
    pub fn step(&mut self, delta: i64) -> Result<bool, FetchError> {
        let Some(pair) = &self.pair else {
            return Err(FetchError::NoSources);
        };
        if self.phase == PlayerPhase::Playing {
            return Ok(false);
        }
        let target = (self.state.current_frame as i64).saturating_add(delta);
        let in_range = target >= 0
            && pair
                .timeline
                .frames()
                .is_none_or(|len| (target as u64) < len);
        if !in_range {
            debug!(target, "Step target outside timeline");
            return Ok(false);
        }
        self.state.current_frame = target as u64;
        self.show_frame()?;
        self.report("Stepped");
        Ok(true)
    }

    /// Frames of B relative to A. Takes effect on the next fetch.
    pub fn set_offset(&mut self, offset_frames: i64) -> Result<(), FetchError> {
        self.state.offset_frames = offset_frames;
        info!(offset_frames, "Offset changed");
        if self.pair.is_some() && self.phase != PlayerPhase::Playing {
            self.show_frame()?;
            self.report("Offset");
        }
        Ok(())
    }

    pub fn adjust_offset(&mut self, delta: i64) -> Result<(), FetchError> {
        self.set_offset(self.state.offset_frames.saturating_add(delta))
    }

    pub fn set_mode(&mut self, mode: ComparisonMode) -> Result<(), FetchError> {
        self.state.comparison_mode = mode;
        self.refresh_view()
    }

    /// Clamped to `[0, width]`.
    pub fn set_split(&mut self, position: i64) -> Result<(), FetchError> {
        self.state.split_position = position.clamp(0, self.geometry.width as i64) as u32;
        self.refresh_view()
    }

    fn refresh_view(&mut self) -> Result<(), FetchError> {
        let labels = self.current_labels();
        self.sync_view(labels);
        if self.pair.is_some() && self.phase != PlayerPhase::Playing {
            self.show_frame()?;
        }
        Ok(())
    }

    /// Applies a settled display area. Returns whether the geometry changed.
    #[instrument(skip(self))]
    pub fn resize(&mut self, area: DisplayArea) -> Result<bool, FetchError> {
        self.area = area;
        let next = match decide(self.pair.as_ref(), self.geometry, area) {
            ResizeDecision::Apply(next) => next,
            decision => {
                debug!(?decision, "Resize not applied");
                return Ok(false);
            }
        };

        let was_playing = self.phase == PlayerPhase::Playing;
        let resume = match self.halt() {
            Some(outcome) => !outcome.termination.is_natural_end(),
            None => false,
        };
        info!(from = %self.geometry, to = %next, "Output geometry changed");
        self.geometry = next;
        self.state.split_position = next.center_column();
        let labels = self.current_labels();
        self.sync_view(labels);

        if was_playing && resume {
            self.metrics.record_stream_restart();
            self.start_worker(self.state.current_frame)?;
        } else {
            self.show_frame()?;
        }
        Ok(true)
    }

    /// Flips the fullscreen flag and applies `area` immediately.
    pub fn toggle_fullscreen(&mut self, area: DisplayArea) -> Result<bool, FetchError> {
        self.fullscreen = !self.fullscreen;
        info!(fullscreen = self.fullscreen, %area, "Fullscreen toggled");
        self.resize(area)
    }

    /// Saves the last presented composite.
    pub fn snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let frame = self.latest_frame().ok_or(SnapshotError::NothingToSave)?;
        snapshot::save_snapshot(&frame, path)
    }

    /// Cancels and joins any running worker.
    pub fn shutdown(&mut self) {
        if self.halt().is_some() {
            info!("Playback stopped for shutdown");
        }
    }

    /// Emits a status line for the current position.
    pub fn report(&self, status: &str) {
        let Some(pair) = &self.pair else {
            self.presenter.status(status);
            return;
        };
        self.presenter.status(&status_line(
            status,
            self.current_frame(),
            pair.timeline,
            pair.shared_frame_rate(),
        ));
    }

    fn start_worker(&mut self, frame: u64) -> Result<(), FetchError> {
        let Some(pair) = &self.pair else {
            return Err(FetchError::NoSources);
        };
        let fetch = StreamingFetch::open(
            self.backend.as_ref(),
            pair,
            frame,
            self.state.offset_frames,
            self.geometry,
        )
        .inspect_err(|err| {
            self.presenter.status(&format!("Error: {err}"));
        })?;

        let worker = PlaybackWorker::spawn(WorkerContext {
            fetch,
            start_frame: frame,
            timeline: pair.timeline,
            shared_frame_rate: pair.shared_frame_rate(),
            max_consecutive_failures: self.options.max_consecutive_failures,
            view: self.view.clone(),
            presenter: self.presenter.clone(),
            latest: self.latest.clone(),
            metrics: self.metrics.clone(),
        })?;
        self.worker = Some(worker);
        self.state.current_frame = frame;
        self.state.is_playing = true;
        self.phase = PlayerPhase::Playing;
        self.playing_since = Some(Instant::now());
        Ok(())
    }

    /// Stops the worker if one is running and folds its outcome into the state.
    fn halt(&mut self) -> Option<PlaybackOutcome> {
        let worker = self.worker.take()?;
        let outcome = worker.stop();
        self.finish(outcome);
        Some(outcome)
    }

    fn finish(&mut self, outcome: PlaybackOutcome) {
        self.state.current_frame = outcome.last_frame;
        self.state.is_playing = false;
        self.phase = PlayerPhase::Paused;
        self.last_outcome = Some(outcome);
        if let Some(started) = self.playing_since.take() {
            self.metrics.record_playback_duration(started.elapsed());
        }
        if outcome.termination.is_natural_end() {
            if let Some(pair) = &mut self.pair {
                pair.finalize_length(outcome.last_frame);
            }
            self.report(outcome.termination.message());
        }
    }

    fn current_labels(&self) -> Option<SourceLabels> {
        self.view.lock().ok().and_then(|guard| guard.labels.clone())
    }

    fn sync_view(&self, labels: Option<SourceLabels>) {
        let next = ViewSettings {
            mode: self.state.comparison_mode,
            split_position: self.state.split_position,
            labels,
        };
        match self.view.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn show_frame(&mut self) -> Result<(), FetchError> {
        let Some(pair) = &self.pair else {
            return Err(FetchError::NoSources);
        };
        let frame = self.state.current_frame;
        let fetched = {
            let _timer = self.metrics.start_stage("fetch");
            fetch_single(
                self.backend.as_ref(),
                pair,
                frame,
                self.state.offset_frames,
                self.geometry,
            )
        };
        let frames = match fetched {
            Ok(frames) => frames,
            Err(err) => {
                self.metrics.record_fetch_failure();
                warn!(frame, error = %err, "Single-frame fetch failed");
                self.presenter
                    .status(&format!("Error seeking to frame {frame}"));
                return Err(err);
            }
        };
        let view = match self.view.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let composed = {
            let _timer = self.metrics.start_stage("compose");
            compose(&frames, &view)
        };
        {
            let _timer = self.metrics.start_stage("present");
            self.presenter.present(&composed);
        }
        self.metrics.record_presented();
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(composed);
        }
        Ok(())
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}
