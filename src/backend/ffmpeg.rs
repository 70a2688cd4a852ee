use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{DecodeBackend, DecodeRequest, FrameStream, ProbeReport, StreamInfo};
use crate::config::BackendConfig;
use crate::error::{FetchError, SourceLoadError};

/// Decoder backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.ffprobe.clone())
    }

    /// Executables that cannot be run with `-version`.
    pub fn missing_tools(&self) -> Vec<PathBuf> {
        [&self.ffmpeg, &self.ffprobe]
            .into_iter()
            .filter(|tool| !tool_runs(tool))
            .cloned()
            .collect()
    }
}

fn tool_runs(tool: &Path) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

impl DecodeBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    #[instrument(skip(self))]
    fn probe(&self, path: &Path) -> Result<ProbeReport, SourceLoadError> {
        std::fs::metadata(path).map_err(|source| SourceLoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map_err(|err| SourceLoadError::Probe {
                path: path.to_path_buf(),
                reason: format!("failed to run {}: {err}", self.ffprobe.display()),
            })?;

        if !output.status.success() {
            return Err(SourceLoadError::Probe {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {}", output.status),
            });
        }

        parse_probe_json(&output.stdout).map_err(|err| SourceLoadError::Probe {
            path: path.to_path_buf(),
            reason: format!("invalid ffprobe JSON: {err}"),
        })
    }

    #[instrument(skip(self), fields(path = %request.path.display(), seek = request.seek_seconds))]
    fn decode_frame(&self, request: &DecodeRequest) -> Result<Vec<u8>, FetchError> {
        let output = Command::new(&self.ffmpeg)
            .args(decode_args(request, true))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map_err(FetchError::Spawn)?;

        if !output.status.success() {
            return Err(FetchError::Decode(format!(
                "ffmpeg exited with {}",
                output.status
            )));
        }

        let expected = request.geometry.frame_len();
        if output.stdout.len() != expected {
            return Err(FetchError::WrongSize {
                expected,
                actual: output.stdout.len(),
            });
        }
        Ok(output.stdout)
    }

    fn open_stream(&self, request: &DecodeRequest) -> Result<Box<dyn FrameStream>, FetchError> {
        let mut child = Command::new(&self.ffmpeg)
            .args(decode_args(request, false))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(FetchError::Spawn)?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(FetchError::Decode("ffmpeg: no stdout pipe".into()));
        };

        debug!(
            pid = child.id(),
            path = %request.path.display(),
            seek = request.seek_seconds,
            geometry = %request.geometry,
            "Decode stream started"
        );

        Ok(Box::new(FfmpegStream {
            child,
            stdout,
            eof: false,
        }))
    }
}

/// Command line for one decode request. Negative seek times start at 0.
pub fn decode_args(request: &DecodeRequest, single_frame: bool) -> Vec<OsString> {
    let seek = request.seek_seconds.max(0.0);
    let mut args: Vec<OsString> = vec![
        "-ss".into(),
        format!("{seek:.6}").into(),
        "-i".into(),
        request.path.clone().into_os_string(),
        "-vf".into(),
        format!(
            "scale={}:{}",
            request.geometry.width, request.geometry.height
        )
        .into(),
        "-f".into(),
        "image2pipe".into(),
        "-vcodec".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "bgr24".into(),
    ];
    if single_frame {
        args.push("-vframes".into());
        args.push("1".into());
    }
    args.push("-".into());
    args
}

/// Running `ffmpeg` process piping raw frames; killed and reaped on drop.
struct FfmpegStream {
    child: Child,
    stdout: ChildStdout,
    eof: bool,
}

impl FrameStream for FfmpegStream {
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    fn is_alive(&mut self) -> bool {
        if self.eof {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            // exited cleanly; frames may still be buffered in the pipe
            Ok(Some(status)) => status.success(),
            Err(err) => {
                warn!(error = %err, "Failed to poll decode process");
                false
            }
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        let pid = self.child.id();
        if let Ok(None) = self.child.try_wait()
            && let Err(err) = self.child.kill()
        {
            warn!(pid, error = %err, "Failed to kill decode process");
        }
        let _ = self.child.wait();
        debug!(pid, "Decode stream torn down");
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parses `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(bytes: &[u8]) -> Result<ProbeReport, serde_json::Error> {
    let output: ProbeOutput = serde_json::from_slice(bytes)?;
    let streams = output
        .streams
        .into_iter()
        .map(|stream| StreamInfo {
            codec_type: stream.codec_type,
            width: stream.width,
            height: stream.height,
            // avg_frame_rate is "0/0" for some containers
            frame_rate: stream
                .avg_frame_rate
                .filter(|rate| rate != "0/0")
                .or(stream.r_frame_rate),
            duration: stream.duration,
        })
        .collect();
    Ok(ProbeReport {
        streams,
        format_duration: output.format.and_then(|format| format.duration),
    })
}
