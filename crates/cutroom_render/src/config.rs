use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Frame size and rate of rendered segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        preset_1080p()
    }
}

impl OutputSettings {
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// 1920x1080 25fps preset.
pub fn preset_1080p() -> OutputSettings {
    OutputSettings {
        width: 1920,
        height: 1080,
        fps: 25,
    }
}

/// 1280x720 25fps preset.
pub fn preset_720p() -> OutputSettings {
    OutputSettings {
        width: 1280,
        height: 720,
        fps: 25,
    }
}

/// 1080x1920 25fps (vertical/shorts) preset.
pub fn preset_shorts() -> OutputSettings {
    OutputSettings {
        width: 1080,
        height: 1920,
        fps: 25,
    }
}

/// Look a preset up by the name used on the command line.
pub fn preset_by_name(name: &str) -> Option<OutputSettings> {
    match name.to_ascii_lowercase().as_str() {
        "1080p" => Some(preset_1080p()),
        "720p" => Some(preset_720p()),
        "shorts" => Some(preset_shorts()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub output: OutputSettings,
    /// Width of extracted thumbnail frames; height keeps the aspect ratio.
    pub thumbnail_width: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            output: OutputSettings::default(),
            thumbnail_width: 160,
        }
    }
}
