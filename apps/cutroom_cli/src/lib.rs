mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cutroom_core::assets::Manifest;
use cutroom_core::session::{EditorAction, EditorSession};
use cutroom_core::types::{Clip, ClipKind, FilterEffect, TimeUs};
use cutroom_render::config::{preset_by_name, EngineConfig};
use cutroom_render::export::{export_timeline, ExportOptions, ExportProgress, EXPORT_FILE_NAME};
use cutroom_render::thumbnails::prepare_draft;
use cutroom_render::transcode::Transcoder;
use tokio::sync::watch;

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "cutroom", version, about = "Assemble and export video timelines")]
pub struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// ffmpeg binary.
    #[arg(long, global = true, env = "CUTROOM_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary.
    #[arg(long, global = true, env = "CUTROOM_FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Output preset: 1080p, 720p or shorts.
    #[arg(long, global = true, env = "CUTROOM_PRESET", default_value = "1080p")]
    preset: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the timeline a manifest produces.
    Plan(PlanArgs),
    /// Render a manifest's timeline to an MP4 file.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Manifest JSON listing assets and/or clip drafts.
    manifest: PathBuf,

    /// Probe video assets whose duration the manifest does not give.
    #[arg(long)]
    probe: bool,

    /// Print the timeline as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Manifest JSON listing assets and/or clip drafts.
    manifest: PathBuf,

    /// Output MP4 path.
    #[arg(long, short, default_value = EXPORT_FILE_NAME)]
    out: PathBuf,

    /// Skip probing video assets with unknown durations.
    #[arg(long)]
    no_probe: bool,

    /// Seconds allowed for each clip.
    #[arg(long, env = "CUTROOM_CLIP_TIMEOUT")]
    clip_timeout: Option<u64>,

    /// Seconds allowed for the whole export.
    #[arg(long, env = "CUTROOM_TIMEOUT")]
    timeout: Option<u64>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = engine_config(&cli)?;
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args, config).await,
        Command::Export(args) => cmd_export(args, config).await,
    }
}

fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let output = preset_by_name(&cli.preset)
        .with_context(|| format!("unknown preset '{}'", cli.preset))?;
    Ok(EngineConfig {
        ffmpeg_bin: cli.ffmpeg.clone(),
        ffprobe_bin: cli.ffprobe.clone(),
        output,
        ..EngineConfig::default()
    })
}

async fn load_session(
    path: &Path,
    transcoder: &Transcoder,
    probe: bool,
) -> anyhow::Result<EditorSession> {
    let manifest = Manifest::load_from_file(path)
        .with_context(|| format!("load manifest '{}'", path.display()))?;

    let drafts = if probe {
        let mut drafts = Vec::new();
        for asset in &manifest.assets {
            if let Some(draft) = prepare_draft(transcoder, asset).await {
                drafts.push(draft);
            }
        }
        drafts.extend(manifest.clips.iter().cloned());
        drafts
    } else {
        manifest.drafts()
    };

    let mut session = EditorSession::new();
    for draft in drafts {
        session.apply(EditorAction::AddClip { draft });
    }
    tracing::info!(
        clips = session.timeline().len(),
        total = %session.total_duration(),
        "timeline assembled"
    );
    Ok(session)
}

async fn cmd_plan(args: PlanArgs, config: EngineConfig) -> anyhow::Result<()> {
    let transcoder = Transcoder::new(config);
    let session = load_session(&args.manifest, &transcoder, args.probe).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(session.timeline())?);
    } else {
        print!("{}", render_plan(session.timeline().clips(), session.total_duration()));
    }
    Ok(())
}

async fn cmd_export(args: ExportArgs, config: EngineConfig) -> anyhow::Result<()> {
    let transcoder = Transcoder::new(config);
    let session = load_session(&args.manifest, &transcoder, !args.no_probe).await?;
    let state = Arc::new(AppState::new(session, transcoder));

    let options = ExportOptions {
        per_clip_timeout: args.clip_timeout.map(Duration::from_secs),
        total_timeout: args.timeout.map(Duration::from_secs),
        cancel: state.cancel.clone(),
    };

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling after the current step");
            cancel.cancel();
        }
    });

    let clips = state.with_session(|s| {
        s.begin_export();
        s.timeline().clips().to_vec()
    })?;

    let (progress_tx, progress_rx) = watch::channel(ExportProgress::default());
    let reporter = spawn_progress_reporter(Arc::clone(&state), progress_rx);

    let result = export_timeline(&state.transcoder, &clips, &options, &progress_tx).await;
    drop(progress_tx);
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "progress reporter task failed");
    }
    state.with_session(|s| s.finish_export())?;

    let media = result.context("export failed")?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    tokio::fs::write(&args.out, &media.bytes)
        .await
        .with_context(|| format!("write '{}'", args.out.display()))?;

    tracing::info!(
        path = %args.out.display(),
        bytes = media.bytes.len(),
        mime = %media.mime_type,
        "export written"
    );
    Ok(())
}

/// Log each progress update and mirror it into the session's export state.
fn spawn_progress_reporter(
    state: Arc<AppState>,
    mut progress_rx: watch::Receiver<ExportProgress>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            tracing::info!(percent = progress.percent, stage = ?progress.stage, "export progress");
            if let Err(e) = state.with_session(|s| s.set_export_progress(progress.percent)) {
                tracing::warn!(error = %e, "could not record export progress");
            }
        }
    })
}

fn render_plan(clips: &[Clip], total: TimeUs) -> String {
    let mut out = String::new();
    for (i, clip) in clips.iter().enumerate() {
        let kind = match clip.kind() {
            ClipKind::Video => "video",
            ClipKind::Image => "image",
        };
        let step = match clip.kind() {
            ClipKind::Image => "still",
            ClipKind::Video if clip.needs_reencode() => "re-encode",
            ClipKind::Video => "copy",
        };
        let mut notes = Vec::new();
        if clip.speed() != 1.0 {
            notes.push(format!("{}x", clip.speed()));
        }
        if clip.filter != FilterEffect::None {
            notes.push(format!("{:?}", clip.filter).to_lowercase());
        }
        if clip.has_transitions() {
            notes.push("transitions not rendered".into());
        }
        out.push_str(&format!(
            "{i:>3}  {}  {}  {kind:<5}  {step:<9}  {}{}\n",
            clip.start(),
            clip.duration(),
            clip.source_url,
            if notes.is_empty() {
                String::new()
            } else {
                format!("  [{}]", notes.join(", "))
            }
        ));
    }
    out.push_str(&format!("total {total}\n"));
    out
}
