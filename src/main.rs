use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};
use vidcompare::backend::DecodeBackend;
use vidcompare::compositor::ComparisonMode;
use vidcompare::config::CompareConfig;
use vidcompare::geometry::DisplayArea;
use vidcompare::media::{SourcePair, resolve_source};
use vidcompare::observability::{MetricsCollector, log_snapshot};
use vidcompare::playback::{Player, PlayerOptions, Termination};
use vidcompare::presentation::FrameRecorder;
use vidcompare::quality::compute_metrics;
use vidcompare::resize::ResizeDebouncer;
use vidcompare::snapshot::{StillRequest, default_snapshot_path, render_still, save_snapshot};
use vidcompare::validation::validate_config;
use vidcompare::FfmpegBackend;

const SESSION_POLL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    configure_tracing()?;

    let Some(command) = command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(config.as_deref())?;

    match command {
        Commands::Probe { paths } => probe_command(&config, paths),
        Commands::Frame {
            a,
            b,
            output,
            frame,
            offset,
            mode,
            split,
            area,
            metrics,
        } => frame_command(
            &config,
            FrameArgs {
                a,
                b,
                output,
                frame,
                offset,
                mode,
                split,
                area,
                metrics,
            },
        ),
        Commands::Play {
            a,
            b,
            from,
            offset,
            mode,
            split,
            area,
            frames_dir,
            print_metrics,
            metrics_json,
        } => play_command(
            &config,
            PlayArgs {
                a,
                b,
                from,
                offset,
                mode,
                split,
                area,
                frames_dir,
                print_metrics,
                metrics_json,
            },
        ),
        Commands::Session { a, b, mode, area } => session_command(&config, a, b, mode, area),
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CompareConfig> {
    let config = CompareConfig::resolve(path).context("Failed to load configuration")?;
    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!("{warning}");
    }
    if !report.is_ok() {
        for error_msg in &report.errors {
            error!("{error_msg}");
        }
        bail!(
            "Configuration validation failed with {} error(s)",
            report.errors.len()
        );
    }
    Ok(config)
}

fn ensure_inputs_exist(inputs: &[&Path]) -> Result<()> {
    for input in inputs {
        if !input.exists() {
            bail!("Input file '{}' not found", input.display());
        }
    }
    Ok(())
}

/// The decoder tools are the one hard requirement; without them nothing can run.
fn build_backend(config: &CompareConfig) -> Result<Arc<FfmpegBackend>> {
    let backend = FfmpegBackend::from_config(&config.backend);
    let missing = backend.missing_tools();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        bail!(
            "Required decoder tool(s) not available: {}. Install FFmpeg or set {} / {}.",
            names.join(", "),
            vidcompare::config::FFMPEG_ENV,
            vidcompare::config::FFPROBE_ENV
        );
    }
    info!(backend = backend.name(), "Decoder backend ready");
    Ok(Arc::new(backend))
}

fn player_options(
    config: &CompareConfig,
    mode: Option<ComparisonMode>,
    area: Option<DisplayArea>,
) -> PlayerOptions {
    let mut options = PlayerOptions::from_config(config);
    if let Some(mode) = mode {
        options.mode = mode;
    }
    if let Some(area) = area {
        options.area = area;
    }
    options
}

fn probe_command(config: &CompareConfig, paths: Vec<PathBuf>) -> Result<()> {
    let inputs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    ensure_inputs_exist(&inputs)?;
    let backend = build_backend(config)?;

    let mut sources = Vec::with_capacity(paths.len());
    for path in &paths {
        let source = resolve_source(&*backend, path)
            .with_context(|| format!("Failed to probe {}", path.display()))?;
        sources.push(source);
    }
    to_writer_pretty(io::stdout().lock(), &sources).context("Failed to write probe output")?;
    println!();
    Ok(())
}

struct FrameArgs {
    a: PathBuf,
    b: PathBuf,
    output: PathBuf,
    frame: u64,
    offset: i64,
    mode: Option<ComparisonMode>,
    split: Option<i64>,
    area: Option<DisplayArea>,
    metrics: bool,
}

fn frame_command(config: &CompareConfig, args: FrameArgs) -> Result<()> {
    ensure_inputs_exist(&[args.a.as_path(), args.b.as_path()])?;
    let backend = build_backend(config)?;
    let options = player_options(config, args.mode, args.area);

    let pair = SourcePair::new(
        resolve_source(&*backend, &args.a)?,
        resolve_source(&*backend, &args.b)?,
    );
    let request = StillRequest {
        frame: args.frame,
        offset_frames: args.offset,
        mode: options.mode,
        split: args.split,
        area: options.area,
        show_labels: options.show_labels,
    };
    let still = render_still(&*backend, &pair, &request)
        .with_context(|| format!("Failed to fetch frame {}", args.frame))?;
    save_snapshot(&still.composed, &args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        frame = still.frame,
        geometry = %still.composed.geometry,
        mode = %request.mode,
        "Comparison frame written"
    );

    if args.metrics {
        let metrics = compute_metrics(&still.frames)?;
        to_writer_pretty(io::stdout().lock(), &metrics)
            .context("Failed to write quality metrics")?;
        println!();
    }
    Ok(())
}

struct PlayArgs {
    a: PathBuf,
    b: PathBuf,
    from: u64,
    offset: i64,
    mode: Option<ComparisonMode>,
    split: Option<i64>,
    area: Option<DisplayArea>,
    frames_dir: Option<PathBuf>,
    print_metrics: bool,
    metrics_json: Option<PathBuf>,
}

fn play_command(config: &CompareConfig, args: PlayArgs) -> Result<()> {
    ensure_inputs_exist(&[args.a.as_path(), args.b.as_path()])?;
    let backend = build_backend(config)?;
    let recorder = Arc::new(match &args.frames_dir {
        Some(dir) => FrameRecorder::with_frames_dir(dir),
        None => FrameRecorder::new(),
    });
    let metrics = MetricsCollector::new();
    let mut player = Player::new(
        backend,
        recorder.clone(),
        player_options(config, args.mode, args.area),
    )
    .with_metrics(metrics.clone());

    player.load_pair(&args.a, &args.b)?;
    player.set_offset(args.offset)?;
    if let Some(split) = args.split {
        player.set_split(split)?;
    }
    if args.from > 0 {
        player.seek(args.from as i64)?;
    }

    player.play().context("Failed to start playback")?;
    let outcome = player
        .wait()
        .ok_or_else(|| anyhow!("Playback did not start"))?;

    match outcome.termination {
        Termination::FetchFailed => warn!(
            frame = outcome.last_frame,
            "Playback stopped after repeated fetch failures"
        ),
        termination => info!(
            frame = outcome.last_frame,
            advanced = outcome.advanced,
            presented = recorder.presented(),
            "{}",
            termination.message()
        ),
    }

    if args.print_metrics || args.metrics_json.is_some() {
        let snapshot = metrics.snapshot();
        if args.print_metrics {
            log_snapshot(&snapshot);
        }
        if let Some(path) = args.metrics_json {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metrics directory: {}", parent.display())
                })?;
            }
            let file = File::create(&path)
                .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
            to_writer_pretty(file, &snapshot)
                .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
            info!(metrics = %path.display(), "Metrics JSON written");
        }
    }
    Ok(())
}

fn session_command(
    config: &CompareConfig,
    a: PathBuf,
    b: PathBuf,
    mode: Option<ComparisonMode>,
    area: Option<DisplayArea>,
) -> Result<()> {
    ensure_inputs_exist(&[a.as_path(), b.as_path()])?;
    let backend = build_backend(config)?;
    let mut player = Player::new(
        backend,
        Arc::new(FrameRecorder::new()),
        player_options(config, mode, area),
    );
    player.load_pair(&a, &b)?;

    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("vidcompare-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start console reader")?;

    let mut debouncer =
        ResizeDebouncer::new(Duration::from_millis(config.display.resize_debounce_ms));
    info!(
        geometry = %player.geometry(),
        debounce_ms = debouncer.window().as_millis() as u64,
        "Session started"
    );
    eprintln!("{}", SessionCommand::HELP);

    loop {
        let wait = debouncer
            .remaining(Instant::now())
            .map_or(SESSION_POLL, |left| left.min(SESSION_POLL));
        match rx.recv_timeout(wait) {
            Ok(line) => match SessionCommand::parse(&line) {
                Ok(None) => {}
                Ok(Some(SessionCommand::Quit)) => break,
                Ok(Some(command)) => {
                    if let Err(err) = run_session_command(&mut player, &mut debouncer, command) {
                        warn!(error = %err, "Command failed");
                    }
                }
                Err(message) => eprintln!("{message}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(area) = debouncer.poll(Instant::now())
            && let Err(err) = player.resize(area)
        {
            warn!(error = %err, "Resize failed");
        }
        player.poll();
    }

    player.shutdown();
    Ok(())
}

fn run_session_command(
    player: &mut Player,
    debouncer: &mut ResizeDebouncer,
    command: SessionCommand,
) -> Result<()> {
    match command {
        SessionCommand::Play => player.play()?,
        SessionCommand::Pause => {
            player.pause();
        }
        SessionCommand::Toggle => player.toggle_play_pause()?,
        SessionCommand::Step(delta) => {
            player.step(delta)?;
        }
        SessionCommand::Seek(frame) => player.seek(frame)?,
        SessionCommand::Start => player.seek_to_start()?,
        SessionCommand::End => {
            player.seek_to_end()?;
        }
        SessionCommand::SetOffset(offset) => player.set_offset(offset)?,
        SessionCommand::AdjustOffset(delta) => player.adjust_offset(delta)?,
        SessionCommand::Mode(mode) => player.set_mode(mode)?,
        SessionCommand::Split(position) => player.set_split(position)?,
        SessionCommand::Resize(area) => debouncer.notify(area, Instant::now()),
        SessionCommand::Fullscreen(area) => {
            player.toggle_fullscreen(area)?;
        }
        SessionCommand::Snapshot(path) => {
            let path = path.unwrap_or_else(|| default_snapshot_path(Path::new(".")));
            player.snapshot(&path)?;
        }
        SessionCommand::Status => {
            println!("{}", serde_json::to_string(&player.state())?);
        }
        SessionCommand::Help => eprintln!("{}", SessionCommand::HELP),
        SessionCommand::Quit => {}
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum SessionCommand {
    Play,
    Pause,
    Toggle,
    Step(i64),
    Seek(i64),
    Start,
    End,
    SetOffset(i64),
    AdjustOffset(i64),
    Mode(ComparisonMode),
    Split(i64),
    Resize(DisplayArea),
    Fullscreen(DisplayArea),
    Snapshot(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

impl SessionCommand {
    const HELP: &'static str = "commands: play | pause | toggle | step [N] | seek N | start | end | \
offset N|+|- | mode M | split PX | resize WxH | fullscreen WxH | snapshot [PATH] | status | quit";

    /// `Ok(None)` for blank lines.
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        let command = match verb.to_ascii_lowercase().as_str() {
            "play" => SessionCommand::Play,
            "pause" => SessionCommand::Pause,
            "toggle" | "p" => SessionCommand::Toggle,
            "step" => SessionCommand::Step(arg.map(parse_int).transpose()?.unwrap_or(1)),
            "seek" => SessionCommand::Seek(parse_int(required(arg, "seek")?)?),
            "start" | "home" => SessionCommand::Start,
            "end" => SessionCommand::End,
            "offset" => match required(arg, "offset")? {
                "+" => SessionCommand::AdjustOffset(1),
                "-" => SessionCommand::AdjustOffset(-1),
                value => SessionCommand::SetOffset(parse_int(value)?),
            },
            "mode" => SessionCommand::Mode(required(arg, "mode")?.parse()?),
            "split" => SessionCommand::Split(parse_int(required(arg, "split")?)?),
            "resize" => SessionCommand::Resize(required(arg, "resize")?.parse()?),
            "fullscreen" => SessionCommand::Fullscreen(required(arg, "fullscreen")?.parse()?),
            "snapshot" => SessionCommand::Snapshot(arg.map(PathBuf::from)),
            "status" => SessionCommand::Status,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" | "q" => SessionCommand::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(Some(command))
    }
}

fn required<'a>(arg: Option<&'a str>, verb: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("'{verb}' needs an argument"))
}

fn parse_int(value: &str) -> Result<i64, String> {
    value
        .parse()
        .map_err(|_| format!("'{value}' is not a whole number"))
}

#[derive(Parser)]
#[command(
    name = "vidcompare",
    version,
    about = "Synchronized frame-by-frame comparison of two videos"
)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved stream metadata of each file as JSON.
    Probe {
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        paths: Vec<PathBuf>,
    },
    /// Compose a single comparison frame and save it as an image.
    Frame {
        #[arg(value_hint = ValueHint::FilePath)]
        a: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        b: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, default_value_t = 0)]
        frame: u64,
        /// Frames of B relative to A.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        #[arg(long, value_enum)]
        mode: Option<ComparisonMode>,
        #[arg(long, allow_negative_numbers = true)]
        split: Option<i64>,
        /// Display area as WIDTHxHEIGHT.
        #[arg(long)]
        area: Option<DisplayArea>,
        /// Also print MSE/PSNR/SSIM between the two frames.
        #[arg(long)]
        metrics: bool,
    },
    /// Play both files in lockstep until the shorter one ends.
    Play {
        #[arg(value_hint = ValueHint::FilePath)]
        a: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        b: PathBuf,
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        #[arg(long, value_enum)]
        mode: Option<ComparisonMode>,
        #[arg(long, allow_negative_numbers = true)]
        split: Option<i64>,
        #[arg(long)]
        area: Option<DisplayArea>,
        /// Write every presented composite as a numbered PNG.
        #[arg(long = "frames-dir", value_hint = ValueHint::DirPath)]
        frames_dir: Option<PathBuf>,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
    },
    /// Interactive console driven by commands on stdin.
    Session {
        #[arg(value_hint = ValueHint::FilePath)]
        a: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        b: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ComparisonMode>,
        #[arg(long)]
        area: Option<DisplayArea>,
    },
}
