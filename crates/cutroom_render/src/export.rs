use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cutroom_core::types::{Clip, ClipMedia};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::engine::TranscodeEngine;
use crate::error::{RenderError, Result};
use crate::transcode::Transcoder;

pub const EXPORT_FILE_NAME: &str = "edited_video.mp4";
pub const EXPORT_MIME_TYPE: &str = "video/mp4";

/// Shared stop request, checked between export steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub per_clip_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum ExportStage {
    #[default]
    Starting,
    Clip { index: usize, count: usize },
    Concatenating,
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub percent: u8,
    #[serde(flatten)]
    pub stage: ExportStage,
}

/// One clip rendered to a standalone segment.
#[derive(Debug, Clone)]
pub struct ClipSegment {
    pub index: usize,
    pub clip_id: Uuid,
    pub bytes: Vec<u8>,
}

/// The finished video, ready for upload.
#[derive(Debug, Clone)]
pub struct ExportedMedia {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// Render every clip in timeline order and join them into one MP4.
///
/// Progress is published on `progress`: 0 at the start, up to 50 while clips
/// render, 90 after the join and 100 on success.
pub async fn export_timeline<E: TranscodeEngine>(
    transcoder: &Transcoder<E>,
    clips: &[Clip],
    options: &ExportOptions,
    progress: &watch::Sender<ExportProgress>,
) -> Result<ExportedMedia> {
    if clips.is_empty() {
        return Err(RenderError::NoClips);
    }

    let started = std::time::Instant::now();
    tracing::info!(clips = clips.len(), "export started");

    let export = run_export(transcoder, clips, options, progress);
    let result = match options.total_timeout {
        Some(limit) => tokio::time::timeout(limit, export)
            .await
            .unwrap_or_else(|_| {
                Err(RenderError::Timeout {
                    stage: "export".into(),
                    after: limit,
                })
            }),
        None => export.await,
    };

    match &result {
        Ok(media) => tracing::info!(
            bytes = media.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export finished"
        ),
        Err(e) => tracing::warn!(error = %e, "export failed"),
    }
    result
}

async fn run_export<E: TranscodeEngine>(
    transcoder: &Transcoder<E>,
    clips: &[Clip],
    options: &ExportOptions,
    progress: &watch::Sender<ExportProgress>,
) -> Result<ExportedMedia> {
    let mut ordered: Vec<&Clip> = clips.iter().collect();
    ordered.sort_by_key(|c| c.start());
    let count = ordered.len();

    progress.send_replace(ExportProgress::default());

    let mut segments = Vec::with_capacity(count);
    for (index, clip) in ordered.into_iter().enumerate() {
        check_cancel(options)?;
        if clip.has_transitions() {
            tracing::warn!(
                clip = %clip.id,
                transition_in = ?clip.transition_in,
                transition_out = ?clip.transition_out,
                "transitions are not rendered in exports"
            );
        }

        let segment = render_clip(transcoder, clip, index, options).await?;
        segments.push(segment);

        progress.send_replace(ExportProgress {
            percent: clip_percent(index, count),
            stage: ExportStage::Clip { index, count },
        });
    }

    check_cancel(options)?;
    progress.send_replace(ExportProgress {
        percent: clip_percent(count - 1, count),
        stage: ExportStage::Concatenating,
    });
    let buffers: Vec<Vec<u8>> = segments
        .into_iter()
        .map(|s| {
            tracing::debug!(index = s.index, clip = %s.clip_id, bytes = s.bytes.len(), "queued for concat");
            s.bytes
        })
        .collect();
    let bytes = transcoder.concat(&buffers).await?;
    progress.send_replace(ExportProgress {
        percent: 90,
        stage: ExportStage::Concatenating,
    });

    progress.send_replace(ExportProgress {
        percent: 100,
        stage: ExportStage::Finished,
    });
    Ok(ExportedMedia {
        bytes,
        file_name: EXPORT_FILE_NAME.to_string(),
        mime_type: EXPORT_MIME_TYPE.to_string(),
    })
}

async fn render_clip<E: TranscodeEngine>(
    transcoder: &Transcoder<E>,
    clip: &Clip,
    index: usize,
    options: &ExportOptions,
) -> Result<ClipSegment> {
    let url = clip.source_url.as_str();
    let (operation, rendered) = match clip.media() {
        ClipMedia::Image { ken_burns } => (
            "render_image_as_video",
            budget(
                index,
                options.per_clip_timeout,
                transcoder.render_image_as_video(url, clip.duration(), ken_burns.as_ref()),
            )
            .await,
        ),
        ClipMedia::Video { trim_start, .. } if clip.needs_reencode() => (
            "trim_and_filter_video",
            budget(
                index,
                options.per_clip_timeout,
                transcoder.trim_and_filter_video(
                    url,
                    *trim_start,
                    *trim_start + clip.source_span(),
                    clip.speed(),
                    clip.filter,
                ),
            )
            .await,
        ),
        ClipMedia::Video { trim_start, .. } => (
            "copy_segment",
            budget(
                index,
                options.per_clip_timeout,
                transcoder.copy_segment(url, *trim_start, clip.duration()),
            )
            .await,
        ),
    };

    let bytes = rendered.map_err(|e| match e {
        RenderError::Timeout { .. }
        | RenderError::Cancelled
        | RenderError::EngineUnavailable(_) => e,
        other => RenderError::ClipFailed {
            index,
            clip_id: clip.id,
            operation,
            source: Box::new(other),
        },
    })?;
    tracing::debug!(index, clip = %clip.id, operation, bytes = bytes.len(), "clip rendered");

    Ok(ClipSegment {
        index,
        clip_id: clip.id,
        bytes,
    })
}

async fn budget<T>(
    index: usize,
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(after) => tokio::time::timeout(after, fut).await.unwrap_or_else(|_| {
            Err(RenderError::Timeout {
                stage: format!("clip {index}"),
                after,
            })
        }),
        None => fut.await,
    }
}

fn check_cancel(options: &ExportOptions) -> Result<()> {
    if options.cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }
    Ok(())
}

fn clip_percent(index: usize, count: usize) -> u8 {
    (((index + 1) as f64 / count as f64) * 50.0).round() as u8
}
