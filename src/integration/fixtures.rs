//! Test fixtures for integration tests

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{FetchConfig, ServerConfig};
use crate::http::create_router;
use crate::state::AppState;

/// Fetch tool that prints each argument it receives on its own line
pub fn echo_tool() -> FetchConfig {
    script_tool("printf '%s\\n' \"$@\"")
}

/// Fetch tool running `script` under `sh`, with the relay's arguments in `$@`
pub fn script_tool(script: &str) -> FetchConfig {
    FetchConfig {
        executable: "sh".to_string(),
        prefix_args: vec!["-c".to_string(), script.to_string(), "fetch-tool".to_string()],
        grace_period_secs: 1,
        ..Default::default()
    }
}

pub fn config_with(fetch: FetchConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        fetch,
        ..Default::default()
    }
}

/// Shared state plus a router over it
pub fn test_app(config: ServerConfig) -> (Arc<AppState>, Router) {
    let mut state = AppState::new(config).unwrap();
    // Origins are on loopback; keep any proxy from the environment out of the way.
    state.http_client = reqwest::Client::builder().no_proxy().build().unwrap();
    let state = Arc::new(state);
    (state.clone(), create_router(state))
}

/// Serve `router` on an ephemeral loopback port
pub async fn spawn_origin(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
