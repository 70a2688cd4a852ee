//! Background pacing loop for continuous playback.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::compositor::{ComposedFrame, ViewSettings, compose};
use crate::fetch::{StreamPull, StreamingFetch};
use crate::media::TimelineLength;
use crate::observability::MetricsCollector;
use crate::presentation::{Presenter, status_line};

/// Cooperative stop signal, checked at the top of every loop iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Pause, seek, resize, or shutdown asked the loop to stop.
    Cancelled,
    /// The shared timeline bound was reached.
    Finished,
    /// One of the decode streams ran out of input.
    StreamEnded,
    /// Too many consecutive short reads.
    FetchFailed,
}

impl Termination {
    pub fn message(&self) -> &'static str {
        match self {
            Termination::Cancelled => "Paused",
            Termination::Finished => "Finished",
            Termination::StreamEnded => "Video stream ended",
            Termination::FetchFailed => "Error: Playback stopped",
        }
    }

    pub fn is_natural_end(&self) -> bool {
        !matches!(self, Termination::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOutcome {
    pub termination: Termination,
    pub last_frame: u64,
    /// Frames advanced during this run.
    pub advanced: u64,
}

pub struct WorkerContext {
    pub fetch: StreamingFetch,
    pub start_frame: u64,
    pub timeline: TimelineLength,
    pub shared_frame_rate: f64,
    pub max_consecutive_failures: u32,
    pub view: Arc<Mutex<ViewSettings>>,
    pub presenter: Arc<dyn Presenter>,
    /// Last composite shown, kept for snapshots.
    pub latest: Arc<Mutex<Option<ComposedFrame>>>,
    pub metrics: MetricsCollector,
}

/// Handle to a running pacing loop. Owns the streaming fetch through the thread.
pub struct PlaybackWorker {
    cancel: CancelToken,
    position: Arc<AtomicU64>,
    handle: JoinHandle<PlaybackOutcome>,
}

impl PlaybackWorker {
    pub fn spawn(ctx: WorkerContext) -> io::Result<Self> {
        let cancel = CancelToken::new();
        let position = Arc::new(AtomicU64::new(ctx.start_frame));
        let handle = {
            let cancel = cancel.clone();
            let position = position.clone();
            thread::Builder::new()
                .name("vidcompare-playback".into())
                .spawn(move || run(ctx, cancel, position))?
        };
        Ok(Self {
            cancel,
            position,
            handle,
        })
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Requests cancellation and waits for the loop to exit.
    pub fn stop(self) -> PlaybackOutcome {
        self.cancel.cancel();
        self.join()
    }

    pub fn join(self) -> PlaybackOutcome {
        let position = self.position.clone();
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Playback worker panicked");
                PlaybackOutcome {
                    termination: Termination::FetchFailed,
                    last_frame: position.load(Ordering::SeqCst),
                    advanced: 0,
                }
            }
        }
    }
}

fn run(mut ctx: WorkerContext, cancel: CancelToken, position: Arc<AtomicU64>) -> PlaybackOutcome {
    let pace = Duration::from_secs_f64(1.0 / ctx.shared_frame_rate.max(f64::EPSILON));
    let mut frame = ctx.start_frame;
    let mut advanced = 0u64;
    let mut failures = 0u32;

    info!(start = frame, fps = ctx.shared_frame_rate, "Playback loop started");

    let termination = loop {
        if cancel.is_cancelled() {
            break Termination::Cancelled;
        }
        if !ctx.fetch.streams_alive() {
            break Termination::StreamEnded;
        }
        if let Some(last) = ctx.timeline.last_frame()
            && frame >= last
        {
            break Termination::Finished;
        }

        let pulled = {
            let _timer = ctx.metrics.start_stage("fetch");
            ctx.fetch.pull()
        };
        let pair = match pulled {
            StreamPull::Frames(pair) => pair,
            StreamPull::Short { a, b } => {
                failures += 1;
                ctx.metrics.record_fetch_failure();
                debug!(read_a = a, read_b = b, failures, "Short read from decode stream");
                if failures >= ctx.max_consecutive_failures {
                    warn!(failures, "Decode streams starved; stopping playback");
                    break Termination::FetchFailed;
                }
                continue;
            }
        };
        failures = 0;
        frame += 1;
        advanced += 1;
        position.store(frame, Ordering::SeqCst);

        let view = match ctx.view.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let composed = {
            let _timer = ctx.metrics.start_stage("compose");
            compose(&pair, &view)
        };
        {
            let _timer = ctx.metrics.start_stage("present");
            ctx.presenter.present(&composed);
        }
        if let Ok(mut latest) = ctx.latest.lock() {
            *latest = Some(composed);
        }
        ctx.metrics.record_presented();
        ctx.presenter.status(&status_line(
            "Playing",
            frame,
            ctx.timeline,
            ctx.shared_frame_rate,
        ));

        // fixed sleep; decode time is not subtracted
        thread::sleep(pace);
    };

    info!(
        frame,
        advanced,
        reason = termination.message(),
        "Playback loop exited"
    );
    PlaybackOutcome {
        termination,
        last_frame: frame,
        advanced,
    }
}
