//! Stream relay handler
//!
//! GET /getStream/{url}?referer=..&agent=..

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::Instrument;

use crate::error::RelayError;
use crate::relay::StreamRequest;
use crate::state::AppState;

/// In-memory pipe capacity between the relay task and the response body
const RELAY_PIPE_BYTES: usize = 256 * 1024;

/// Query parameters for stream requests
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub referer: Option<String>,
    pub agent: Option<String>,
}

/// Relay a media stream through the fetch tool.
///
/// The response is returned as soon as the subprocess is running; a
/// detached task copies its output into the body. When the client goes
/// away the body is dropped, the task's next write fails and the
/// subprocess is killed.
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Query(params): Query<StreamParams>,
) -> Result<Response, RelayError> {
    let request = StreamRequest::new(target, params.referer, params.agent)?;
    let permit = state.acquire_stream_slot()?;

    let handle = match state.relay.spawn(&request) {
        Ok(handle) => handle,
        Err(e) => {
            state.registry.record_spawn_failure();
            return Err(e);
        }
    };

    let (writer, reader) = tokio::io::duplex(RELAY_PIPE_BYTES);
    let guard = state.registry.begin(&request.target);
    let span = tracing::info_span!("relay", id = %guard.id(), pid = ?handle.pid());

    let relay_state = Arc::clone(&state);
    tokio::spawn(
        async move {
            let report = relay_state.relay.run(handle, writer).await;
            relay_state.registry.finish(guard, &report);
            drop(permit);
        }
        .instrument(span),
    );

    let body = Body::from_stream(ReaderStream::new(reader));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
