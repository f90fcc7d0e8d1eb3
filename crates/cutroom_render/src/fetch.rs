use base64::Engine as _;

use crate::error::{RenderError, Result};

/// Load the bytes behind a clip's source URL.
///
/// Accepts `http(s)://` URLs, `data:` URLs with base64 payloads, `file://` URLs
/// and plain filesystem paths.
pub async fn fetch_source(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_http(client, url).await;
    }
    if let Some(rest) = url.strip_prefix("data:") {
        return decode_data_url(url, rest);
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    match tokio::fs::read(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RenderError::FileNotFound(path.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn fetch_http(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let fail = |e: reqwest::Error| RenderError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    };
    let response = client
        .get(url)
        .send()
        .await
        .map_err(fail)?
        .error_for_status()
        .map_err(fail)?;
    let body = response.bytes().await.map_err(fail)?;
    tracing::debug!(url, bytes = body.len(), "fetched source");
    Ok(body.to_vec())
}

fn decode_data_url(url: &str, rest: &str) -> Result<Vec<u8>> {
    let fail = |reason: String| RenderError::Fetch {
        url: abbreviate(url),
        reason,
    };
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| fail("data URL has no payload".into()))?;
    if !meta.ends_with(";base64") {
        return Err(fail("only base64 data URLs are supported".into()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| fail(e.to_string()))
}

fn abbreviate(url: &str) -> String {
    match url.char_indices().nth(48) {
        Some((i, _)) => format!("{}...", &url[..i]),
        None => url.to_string(),
    }
}

/// Lowercase file extension of a URL's last path segment, if it looks like one.
pub fn extension_of(url: &str) -> Option<String> {
    if url.starts_with("data:") {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
