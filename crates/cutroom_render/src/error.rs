use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no clips to export")]
    NoClips,

    #[error("transcoding engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("clip {index} ({clip_id}) failed in {operation}: {source}")]
    ClipFailed {
        index: usize,
        clip_id: uuid::Uuid,
        operation: &'static str,
        source: Box<RenderError>,
    },

    #[error("export cancelled")]
    Cancelled,

    #[error("{stage} exceeded its {after:?} budget")]
    Timeout { stage: String, after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// The innermost error, looking through per-clip wrappers.
    pub fn root(&self) -> &RenderError {
        match self {
            RenderError::ClipFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
