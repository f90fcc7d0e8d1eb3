//! In-memory engines for exercising the transcoder and export without ffmpeg.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use cutroom_core::types::TimeUs;

use crate::config::EngineConfig;
use crate::engine::TranscodeEngine;
use crate::error::{RenderError, Result};
use crate::export::CancelFlag;
use crate::probe::ProbeResult;

/// Records every call. `exec` writes `<input>` to the last argument, and the
/// concat demuxer joins the listed files, so final outputs spell out clip order.
pub(crate) struct FakeEngine {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub execs: Mutex<Vec<Vec<String>>>,
    pub probe_result: ProbeResult,
    pub fail_when: Option<&'static str>,
    pub hang_when: Option<&'static str>,
    /// Raise the flag once this many execs have completed.
    pub cancel_on_exec: Option<(usize, CancelFlag)>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            execs: Mutex::new(Vec::new()),
            probe_result: ProbeResult {
                duration: TimeUs::from_seconds(10.0),
                width: 1920,
                height: 1080,
                fps: 25.0,
                codec: "h264".into(),
                has_audio: true,
            },
            fail_when: None,
            hang_when: None,
            cancel_on_exec: None,
        }
    }
}

impl FakeEngine {
    pub fn file_names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn exec_log(&self) -> Vec<Vec<String>> {
        self.execs.lock().unwrap().clone()
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::FileNotFound(name.to_string()))
    }

    fn render(&self, args: &[String]) -> Result<Vec<u8>> {
        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .ok_or_else(|| RenderError::FfmpegFailed("no input".into()))?;
        let input = self.get(input)?;

        if args.iter().any(|a| a == "concat") {
            let list = String::from_utf8_lossy(&input).into_owned();
            let mut joined = Vec::new();
            for line in list.lines() {
                let name = line
                    .trim()
                    .strip_prefix("file '")
                    .and_then(|rest| rest.strip_suffix('\''))
                    .ok_or_else(|| RenderError::FfmpegFailed(format!("bad list line {line}")))?;
                joined.extend(self.get(name)?);
            }
            return Ok(joined);
        }

        let mut out = b"<".to_vec();
        out.extend(input);
        out.push(b'>');
        Ok(out)
    }
}

impl TranscodeEngine for FakeEngine {
    async fn load(_config: &EngineConfig) -> Result<Self> {
        Ok(Self::default())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.get(name)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        self.execs.lock().unwrap().push(args.to_vec());
        let matches = |needle: Option<&str>| {
            needle.is_some_and(|n| args.iter().any(|a| a.contains(n)))
        };
        if matches(self.hang_when) {
            std::future::pending::<()>().await;
        }
        if matches(self.fail_when) {
            return Err(RenderError::FfmpegFailed("simulated failure".into()));
        }
        let output = args
            .last()
            .ok_or_else(|| RenderError::FfmpegFailed("no output".into()))?
            .clone();
        let data = self.render(args)?;
        self.files.lock().unwrap().insert(output, data);
        if let Some((n, flag)) = &self.cancel_on_exec {
            if self.execs.lock().unwrap().len() >= *n {
                flag.cancel();
            }
        }
        Ok(())
    }

    async fn probe(&self, name: &str) -> Result<ProbeResult> {
        self.get(name)?;
        Ok(self.probe_result.clone())
    }
}

/// An engine that can never be loaded.
pub(crate) struct UnavailableEngine;

impl TranscodeEngine for UnavailableEngine {
    async fn load(_config: &EngineConfig) -> Result<Self> {
        Err(RenderError::EngineUnavailable("no engine in tests".into()))
    }

    async fn write_file(&self, _name: &str, _data: &[u8]) -> Result<()> {
        Err(RenderError::EngineUnavailable("not loaded".into()))
    }

    async fn read_file(&self, _name: &str) -> Result<Vec<u8>> {
        Err(RenderError::EngineUnavailable("not loaded".into()))
    }

    async fn delete_file(&self, _name: &str) -> Result<()> {
        Err(RenderError::EngineUnavailable("not loaded".into()))
    }

    async fn exec(&self, _args: &[String]) -> Result<()> {
        Err(RenderError::EngineUnavailable("not loaded".into()))
    }

    async fn probe(&self, _name: &str) -> Result<ProbeResult> {
        Err(RenderError::EngineUnavailable("not loaded".into()))
    }
}

/// Write `content` to `dir/name` and return the path as a source URL.
pub(crate) fn source_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}
