use std::sync::Mutex as StdMutex;

use cutroom_core::types::{clamp_speed, FilterEffect, KenBurns, TimeUs};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use uuid::Uuid;

use crate::config::{EngineConfig, OutputSettings};
use crate::engine::{FfmpegEngine, TranscodeEngine};
use crate::error::{RenderError, Result};
use crate::fetch::{extension_of, fetch_source};
use crate::probe::ProbeResult;

/// Single owner of a transcoding engine.
///
/// The engine is loaded on first use and reused afterwards. Operations are
/// serialised; each stages its files in the engine and removes them again
/// whether it succeeds, fails, or is dropped part-way.
pub struct Transcoder<E = FfmpegEngine> {
    engine: OnceCell<E>,
    config: EngineConfig,
    gate: Mutex<()>,
    orphans: StdMutex<Vec<String>>,
    client: reqwest::Client,
}

impl<E: TranscodeEngine> Transcoder<E> {
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, OnceCell::new())
    }

    /// Use an already-loaded engine.
    pub fn with_engine(config: EngineConfig, engine: E) -> Self {
        Self::build(config, OnceCell::new_with(Some(engine)))
    }

    fn build(config: EngineConfig, engine: OnceCell<E>) -> Self {
        Self {
            engine,
            config,
            gate: Mutex::new(()),
            orphans: StdMutex::new(Vec::new()),
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    pub fn loaded_engine(&self) -> Option<&E> {
        self.engine.get()
    }

    /// Load the engine if needed. A failed load is retried on the next call.
    pub async fn load(&self) -> Result<&E> {
        self.engine.get_or_try_init(|| E::load(&self.config)).await
    }

    /// Source duration in seconds.
    pub async fn probe_duration(&self, url: &str) -> Result<f64> {
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = self.probe_source(engine, &mut scratch, url).await;
        scratch.release(engine).await;
        result.map(|p| p.duration.as_seconds())
    }

    /// One JPEG frame at `at`, scaled to the configured thumbnail width.
    pub async fn extract_frame(&self, url: &str, at: TimeUs) -> Result<Vec<u8>> {
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = async {
            let input = self.stage(engine, &mut scratch, url, "thumb_in", "mp4").await?;
            let output = scratch.file("thumb", "jpg");
            let args = frame_args(&input, &output, at, self.config.thumbnail_width);
            engine.exec(&args).await?;
            engine.read_file(&output).await
        }
        .await;
        scratch.release(engine).await;
        result
    }

    /// Loop a still image into an H.264 segment of `duration`.
    pub async fn render_image_as_video(
        &self,
        url: &str,
        duration: TimeUs,
        ken_burns: Option<&KenBurns>,
    ) -> Result<Vec<u8>> {
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = async {
            let input = self.stage(engine, &mut scratch, url, "img_in", "jpg").await?;
            let output = scratch.file("img_out", "mp4");
            let args = image_args(&input, &output, duration, ken_burns, &self.config.output);
            engine.exec(&args).await?;
            engine.read_file(&output).await
        }
        .await;
        scratch.release(engine).await;
        result
    }

    /// Cut `[trim_start, trim_end)` from a video, retime it to `speed` and apply
    /// `filter`, re-encoding to H.264/AAC.
    pub async fn trim_and_filter_video(
        &self,
        url: &str,
        trim_start: TimeUs,
        trim_end: TimeUs,
        speed: f64,
        filter: FilterEffect,
    ) -> Result<Vec<u8>> {
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = async {
            let input = self.stage(engine, &mut scratch, url, "trim_in", "mp4").await?;
            let has_audio = engine.probe(&input).await?.has_audio;
            if !has_audio {
                tracing::debug!(url, "source has no audio track");
            }
            let output = scratch.file("trim_out", "mp4");
            let cut = TrimCut {
                start: trim_start,
                end: trim_end,
                speed,
                filter,
                has_audio,
            };
            engine.exec(&trim_args(&input, &output, &cut)).await?;
            engine.read_file(&output).await
        }
        .await;
        scratch.release(engine).await;
        result
    }

    /// Stream-copy `duration` of a video starting at `start`.
    pub async fn copy_segment(&self, url: &str, start: TimeUs, duration: TimeUs) -> Result<Vec<u8>> {
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = async {
            let input = self.stage(engine, &mut scratch, url, "copy_in", "mp4").await?;
            let output = scratch.file("copy_out", "mp4");
            engine.exec(&copy_args(&input, &output, start, duration)).await?;
            engine.read_file(&output).await
        }
        .await;
        scratch.release(engine).await;
        result
    }

    /// Join rendered segments in order with the concat demuxer.
    pub async fn concat(&self, segments: &[Vec<u8>]) -> Result<Vec<u8>> {
        if segments.is_empty() {
            return Err(RenderError::NoClips);
        }
        let (engine, _gate) = self.begin().await?;
        let mut scratch = self.scratch();
        let result = async {
            let mut list = String::new();
            for (i, segment) in segments.iter().enumerate() {
                let name = scratch.file(&format!("clip_{i}"), "mp4");
                engine.write_file(&name, segment).await?;
                list.push_str(&format!("file '{name}'\n"));
            }
            let list_name = scratch.file("concat", "txt");
            engine.write_file(&list_name, list.as_bytes()).await?;

            let output = scratch.file("final_output", "mp4");
            engine.exec(&concat_args(&list_name, &output)).await?;
            engine.read_file(&output).await
        }
        .await;
        scratch.release(engine).await;
        result
    }

    async fn begin(&self) -> Result<(&E, MutexGuard<'_, ()>)> {
        let engine = self.load().await?;
        let gate = self.gate.lock().await;
        for name in self.take_orphans() {
            if let Err(e) = engine.delete_file(&name).await {
                tracing::warn!(file = %name, error = %e, "failed to remove abandoned scratch file");
            }
        }
        Ok((engine, gate))
    }

    fn take_orphans(&self) -> Vec<String> {
        match self.orphans.lock() {
            Ok(mut orphans) => std::mem::take(&mut *orphans),
            Err(_) => Vec::new(),
        }
    }

    fn scratch(&self) -> Scratch<'_> {
        Scratch {
            names: Vec::new(),
            orphans: &self.orphans,
        }
    }

    async fn stage(
        &self,
        engine: &E,
        scratch: &mut Scratch<'_>,
        url: &str,
        stem: &str,
        default_ext: &str,
    ) -> Result<String> {
        let data = fetch_source(&self.client, url).await?;
        let ext = extension_of(url).unwrap_or_else(|| default_ext.to_string());
        let name = scratch.file(stem, &ext);
        engine.write_file(&name, &data).await?;
        Ok(name)
    }

    async fn probe_source(
        &self,
        engine: &E,
        scratch: &mut Scratch<'_>,
        url: &str,
    ) -> Result<ProbeResult> {
        let input = self.stage(engine, scratch, url, "probe_in", "mp4").await?;
        engine.probe(&input).await
    }
}

/// Engine file names owned by one operation.
///
/// Names still held when the guard drops (the operation future was cancelled)
/// are handed to the transcoder, which deletes them before its next operation.
struct Scratch<'a> {
    names: Vec<String>,
    orphans: &'a StdMutex<Vec<String>>,
}

impl Scratch<'_> {
    fn file(&mut self, stem: &str, ext: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("{stem}_{}.{ext}", &id[..8]);
        self.names.push(name.clone());
        name
    }

    async fn release<E: TranscodeEngine>(mut self, engine: &E) {
        while let Some(name) = self.names.last().cloned() {
            if let Err(e) = engine.delete_file(&name).await {
                tracing::warn!(file = %name, error = %e, "failed to remove scratch file");
            }
            self.names.pop();
        }
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        if self.names.is_empty() {
            return;
        }
        if let Ok(mut orphans) = self.orphans.lock() {
            orphans.append(&mut self.names);
        }
    }
}

// ---------------------------------------------------------------------------
// ffmpeg argument builders
// ---------------------------------------------------------------------------

fn secs(t: TimeUs) -> String {
    format!("{:.3}", t.as_seconds())
}

fn to_args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn frame_args(input: &str, output: &str, at: TimeUs, width: u32) -> Vec<String> {
    to_args([
        "-ss",
        &secs(at),
        "-i",
        input,
        "-vframes",
        "1",
        "-q:v",
        "2",
        "-vf",
        &format!("scale={width}:-1"),
        output,
    ])
}

pub(crate) fn image_args(
    input: &str,
    output: &str,
    duration: TimeUs,
    ken_burns: Option<&KenBurns>,
    out: &OutputSettings,
) -> Vec<String> {
    let (w, h, fps) = (out.width, out.height, out.fps);
    let filter = match ken_burns {
        Some(kb) => {
            let frames = ((duration.as_seconds() * fps as f64).round() as u64).max(1);
            let (sz, ez) = (kb.start_zoom, kb.end_zoom);
            format!(
                "scale={w}:{h},zoompan=z='{sz}+({ez}-{sz})*on/{frames}':x='{}':y='{}':d={frames}:s={w}x{h}:fps={fps}",
                kb.pan_x, kb.pan_y
            )
        }
        None => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
        ),
    };
    to_args([
        "-loop",
        "1",
        "-i",
        input,
        "-vf",
        &filter,
        "-t",
        &secs(duration),
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-r",
        &fps.to_string(),
        output,
    ])
}

pub(crate) struct TrimCut {
    pub start: TimeUs,
    pub end: TimeUs,
    pub speed: f64,
    pub filter: FilterEffect,
    pub has_audio: bool,
}

pub(crate) fn trim_args(input: &str, output: &str, cut: &TrimCut) -> Vec<String> {
    let speed = clamp_speed(cut.speed);
    let mut args = to_args([
        "-ss",
        &secs(cut.start),
        "-t",
        &secs(cut.end - cut.start),
        "-i",
        input,
    ]);

    let mut video = Vec::new();
    if speed != 1.0 {
        video.push(format!("setpts=PTS/{speed}"));
    }
    if let Some(expr) = filter_expr(cut.filter) {
        video.push(expr.to_string());
    }
    if !video.is_empty() {
        args.push("-vf".into());
        args.push(video.join(","));
    }

    if cut.has_audio && speed != 1.0 {
        let chain: Vec<String> = atempo_chain(speed)
            .iter()
            .map(|s| format!("atempo={s}"))
            .collect();
        args.push("-af".into());
        args.push(chain.join(","));
    }

    args.extend(to_args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]));
    if cut.has_audio {
        args.extend(to_args(["-c:a", "aac"]));
    } else {
        args.push("-an".into());
    }
    args.push(output.to_string());
    args
}

pub(crate) fn copy_args(input: &str, output: &str, start: TimeUs, duration: TimeUs) -> Vec<String> {
    to_args([
        "-ss",
        &secs(start),
        "-i",
        input,
        "-t",
        &secs(duration),
        "-c",
        "copy",
        "-avoid_negative_ts",
        "make_zero",
        output,
    ])
}

pub(crate) fn concat_args(list: &str, output: &str) -> Vec<String> {
    to_args(["-f", "concat", "-safe", "0", "-i", list, "-c", "copy", output])
}

/// Colour filter expression for a named effect.
pub fn filter_expr(filter: FilterEffect) -> Option<&'static str> {
    match filter {
        FilterEffect::None => None,
        FilterEffect::Grayscale => Some("colorchannelmixer=.3:.4:.3:0:.3:.4:.3:0:.3:.4:.3"),
        FilterEffect::Sepia => {
            Some("colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131")
        }
        FilterEffect::Vintage => Some("curves=vintage"),
        FilterEffect::Contrast => Some("eq=contrast=1.3"),
        FilterEffect::Brightness => Some("eq=brightness=0.1"),
    }
}

/// `atempo` only accepts factors in [0.5, 2.0]; larger changes are chained.
pub fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut rest = clamp_speed(speed);
    let mut stages = Vec::new();
    while rest > 2.0 {
        stages.push(2.0);
        rest /= 2.0;
    }
    while rest < 0.5 {
        stages.push(0.5);
        rest /= 0.5;
    }
    stages.push(rest);
    stages
}
