use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::{RenderError, Result};
use crate::probe::{run_ffprobe, ProbeResult};

/// Stderr lines kept for the error message when ffmpeg fails.
const STDERR_TAIL: usize = 12;

/// A transcoding engine with its own flat file namespace.
///
/// Callers stage inputs with [`write_file`](Self::write_file), run ffmpeg-style
/// argument lists that refer to those names, then collect outputs with
/// [`read_file`](Self::read_file). One operation at a time.
pub trait TranscodeEngine: Send + Sync + Sized {
    /// Expensive one-time setup.
    fn load(config: &EngineConfig) -> impl Future<Output = Result<Self>> + Send;

    fn write_file(&self, name: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn read_file(&self, name: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Deleting a name that does not exist is not an error.
    fn delete_file(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn exec(&self, args: &[String]) -> impl Future<Output = Result<()>> + Send;

    fn probe(&self, name: &str) -> impl Future<Output = Result<ProbeResult>> + Send;
}

/// System `ffmpeg`/`ffprobe` working inside a private scratch directory.
///
/// The directory and anything left in it are removed on drop.
#[derive(Debug)]
pub struct FfmpegEngine {
    dir: TempDir,
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

impl FfmpegEngine {
    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || Path::new(name).file_name() != Some(std::ffi::OsStr::new(name)) {
            return Err(RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a plain file name: {name:?}"),
            )));
        }
        Ok(self.dir.path().join(name))
    }
}

impl TranscodeEngine for FfmpegEngine {
    async fn load(config: &EngineConfig) -> Result<Self> {
        let status = Command::new(&config.ffmpeg_bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                RenderError::EngineUnavailable(format!("{}: {e}", config.ffmpeg_bin.display()))
            })?;
        if !status.success() {
            return Err(RenderError::EngineUnavailable(format!(
                "{} -version exited with {status}",
                config.ffmpeg_bin.display()
            )));
        }

        let dir = tempfile::Builder::new().prefix("cutroom-").tempdir()?;
        tracing::info!(
            ffmpeg = %config.ffmpeg_bin.display(),
            scratch = %dir.path().display(),
            "transcoding engine loaded"
        );
        Ok(Self {
            dir,
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
        })
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_of(name)?, data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(self.path_of(name)?).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_of(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        tracing::debug!(args = %args.join(" "), "running ffmpeg");

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(["-hide_banner", "-nostdin", "-y"])
            .args(args)
            .current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::EngineUnavailable(format!("{}: {e}", self.ffmpeg_bin.display()))
                } else {
                    RenderError::Io(e)
                }
            })?;

        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(stderr) = child.stderr.take() {
            // ffmpeg rewrites its progress line with '\r'; split on both.
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while reader.read_until(b'\r', &mut buf).await? > 0 {
                {
                    let chunk = String::from_utf8_lossy(&buf);
                    for line in chunk.split(['\r', '\n']).filter(|l| !l.trim().is_empty()) {
                        log_engine_line(line);
                        if tail.len() == STDERR_TAIL {
                            tail.pop_front();
                        }
                        tail.push_back(line.trim().to_string());
                    }
                }
                buf.clear();
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let tail: Vec<String> = tail.into_iter().collect();
            return Err(RenderError::FfmpegFailed(format!(
                "exited with {status}: {}",
                tail.join(" | ")
            )));
        }
        Ok(())
    }

    async fn probe(&self, name: &str) -> Result<ProbeResult> {
        self.path_of(name)?;
        run_ffprobe(&self.ffprobe_bin, self.dir.path(), name).await
    }
}

fn log_engine_line(line: &str) {
    match parse_progress(line) {
        Some(p) => tracing::trace!(
            frame = p.frame,
            time_secs = p.time_secs,
            speed = p.speed,
            "ffmpeg progress"
        ),
        None => tracing::trace!(target: "cutroom_render::ffmpeg", "{}", line.trim()),
    }
}

/// Progress parsed from an ffmpeg stderr status line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineProgress {
    pub frame: u64,
    pub time_secs: f64,
    pub speed: f64,
}

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str) -> Option<EngineProgress> {
    let time_secs = extract_value(line, "time=").and_then(|v| parse_time_str(&v))?;

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let speed = extract_value(line, "speed=")
        .and_then(|v| v.trim_end_matches('x').parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(EngineProgress {
        frame,
        time_secs,
        speed,
    })
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let trimmed = line[start..].trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = &trimmed[..end];
    (!val.is_empty()).then(|| val.to_string())
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let mins: f64 = parts.next()?.parse().ok()?;
    let secs: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
