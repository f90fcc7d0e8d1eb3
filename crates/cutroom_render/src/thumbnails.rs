use base64::Engine as _;
use cutroom_core::assets::{AssetKind, AssetRecord};
use cutroom_core::types::{ClipDraft, ClipMedia, TimeUs};

use crate::engine::TranscodeEngine;
use crate::error::Result;
use crate::transcode::Transcoder;

/// A JPEG frame of `url` at `at`, as an inline `data:` URL.
pub async fn thumbnail_data_url<E: TranscodeEngine>(
    transcoder: &Transcoder<E>,
    url: &str,
    at: TimeUs,
) -> Result<String> {
    let jpeg = transcoder.extract_frame(url, at).await?;
    Ok(jpeg_data_url(&jpeg))
}

pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}

/// Build the default draft for an asset, filling in what the library did not
/// know: a probed duration and a first-frame thumbnail for videos.
///
/// Probe and thumbnail failures are logged and fall back to the library
/// defaults; they never prevent the clip from being placed.
pub async fn prepare_draft<E: TranscodeEngine>(
    transcoder: &Transcoder<E>,
    asset: &AssetRecord,
) -> Option<ClipDraft> {
    let mut asset = asset.clone();
    if asset.kind == AssetKind::Video && !asset.url.is_empty() {
        if asset.duration.is_none() {
            match transcoder.probe_duration(&asset.url).await {
                Ok(secs) if secs > 0.0 => asset.duration = Some(secs),
                Ok(_) => tracing::warn!(asset = %asset.id, "probe reported no duration"),
                Err(e) => tracing::warn!(asset = %asset.id, error = %e, "duration probe failed"),
            }
        }
        if asset.thumbnail_url.is_none() {
            match thumbnail_data_url(transcoder, &asset.url, TimeUs::ZERO).await {
                Ok(thumb) => asset.thumbnail_url = Some(thumb),
                Err(e) => tracing::warn!(asset = %asset.id, error = %e, "thumbnail extraction failed"),
            }
        }
    }

    let draft = ClipDraft::from_asset(&asset)?;
    if let ClipMedia::Video { source_duration, .. } = &draft.media {
        tracing::debug!(asset = %asset.id, duration = %source_duration, "prepared video clip");
    }
    Some(draft)
}
