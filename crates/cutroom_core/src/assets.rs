use crate::error::{CoreError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
    Audio,
    #[serde(other)]
    Other,
}

/// A generated or uploaded media file, as listed by the asset library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Seconds, when the library already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl AssetRecord {
    pub fn is_placeable(&self) -> bool {
        matches!(self.kind, AssetKind::Video | AssetKind::Image)
    }
}

impl ClipDraft {
    /// Default clip for an asset dropped onto the timeline.
    ///
    /// Returns `None` for asset kinds the timeline cannot hold.
    pub fn from_asset(asset: &AssetRecord) -> Option<Self> {
        let (duration, media) = match asset.kind {
            AssetKind::Image => (
                DEFAULT_IMAGE_DURATION,
                ClipMedia::Image {
                    ken_burns: Some(KenBurns::default()),
                },
            ),
            AssetKind::Video => {
                let duration = asset
                    .duration
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .map(TimeUs::from_seconds)
                    .unwrap_or(FALLBACK_VIDEO_DURATION);
                (duration, ClipMedia::full_video(duration))
            }
            AssetKind::Audio | AssetKind::Other => return None,
        };
        Some(Self {
            source_asset_id: asset.id.clone(),
            source_url: asset.url.clone(),
            duration,
            transition_in: Transition::None,
            transition_out: Transition::None,
            filter: FilterEffect::None,
            thumbnail_url: asset.thumbnail_url.clone(),
            media,
        })
    }
}

/// Media to seed a session with: library assets, ready-made drafts, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    #[serde(default)]
    pub clips: Vec<ClipDraft>,
}

impl Manifest {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(data)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.assets.is_empty() && self.clips.is_empty() {
            return Err(CoreError::InvalidManifest(
                "no assets or clips listed".into(),
            ));
        }
        if let Some(asset) = self
            .assets
            .iter()
            .find(|a| a.is_placeable() && a.url.is_empty())
        {
            return Err(CoreError::InvalidManifest(format!(
                "asset {} has no url",
                asset.id
            )));
        }
        if let Some(draft) = self.clips.iter().find(|d| d.source_url.is_empty()) {
            return Err(CoreError::InvalidManifest(format!(
                "clip from asset {} has no source url",
                draft.source_asset_id
            )));
        }
        Ok(())
    }

    /// Drafts in timeline order: placeable assets first, then explicit clips.
    pub fn drafts(&self) -> Vec<ClipDraft> {
        let skipped = self.assets.iter().filter(|a| !a.is_placeable()).count();
        if skipped > 0 {
            tracing::debug!(skipped, "ignoring assets that cannot be placed on the timeline");
        }
        self.assets
            .iter()
            .filter_map(ClipDraft::from_asset)
            .chain(self.clips.iter().cloned())
            .collect()
    }
}
