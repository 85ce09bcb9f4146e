//! Remote playlist retrieval.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::error::Result;

/// A playlist document as served by its origin
#[derive(Debug, Clone)]
pub struct FetchedPlaylist {
    pub body: String,
    /// Origin's `Content-Type`, if it sent a readable one
    pub content_type: Option<String>,
}

/// GET `url` and return its text. Transport errors and non-success
/// statuses both fail the fetch.
pub async fn fetch_playlist(client: &Client, url: &str) -> Result<FetchedPlaylist> {
    tracing::debug!("Fetching playlist {}", url);
    let response = client.get(url).send().await?.error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let body = response.text().await?;

    tracing::debug!(
        "Fetched playlist {} ({} bytes, content type {:?})",
        url,
        body.len(),
        content_type
    );
    Ok(FetchedPlaylist { body, content_type })
}
