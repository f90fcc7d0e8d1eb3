pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod fetch;
pub mod probe;
pub mod thumbnails;
pub mod transcode;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, OutputSettings};
pub use engine::{FfmpegEngine, TranscodeEngine};
pub use error::{RenderError, Result};
pub use export::{export_timeline, CancelFlag, ExportOptions, ExportProgress, ExportStage, ExportedMedia};
pub use transcode::Transcoder;
