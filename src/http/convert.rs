//! Playlist conversion handler
//!
//! GET /convertM3U/{url}?{passthrough query}

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::RelayError;
use crate::playlist::{fetch_playlist, rewrite_playlist, DEFAULT_PLAYLIST_CONTENT_TYPE};
use crate::state::AppState;

/// Scheme and authority that clients used to reach this server.
///
/// The configured public base URL wins; otherwise `X-Forwarded-Proto`
/// (default `http`) and the `Host` header are used.
pub fn relay_base(public_base_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = public_base_url.filter(|b| !b.is_empty()) {
        return base.trim_end_matches('/').to_string();
    }
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

/// Fetch a playlist and route its nested playlists through the relay.
pub async fn convert_playlist(
    State(state): State<Arc<AppState>>,
    Path(playlist_url): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    if playlist_url.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "playlist URL is empty".to_string(),
        ));
    }

    let base = relay_base(state.config.public_base_url.as_deref(), &headers);
    let fetched = fetch_playlist(&state.http_client, &playlist_url).await?;
    let rewritten = rewrite_playlist(&fetched.body, &base, uri.query());

    let content_type = fetched
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_PLAYLIST_CONTENT_TYPE));

    tracing::info!(
        "Converted playlist {} ({} bytes) with base {}",
        playlist_url,
        rewritten.len(),
        base
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, content_type);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok((response_headers, rewritten).into_response())
}
