//! m3u8 restreamer
//!
//! An HTTP relay that hands media URLs to an external fetch tool (yt-dlp)
//! and streams the tool's output back to the client, plus an HLS playlist
//! converter that routes nested playlists through the relay.

mod config;
mod config_file;
mod error;
mod http;
#[cfg(test)]
mod integration;
mod playlist;
mod process;
mod relay;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ServerConfig, AGENT_ENV};
use crate::error::{RelayError, Result};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "m3u8-restreamer";

/// m3u8 restreamer - relay media streams through yt-dlp
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address, overrides the configured host and port
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging depends on the config, so a broken file is reported once
    // the subscriber is up.
    let (config, config_error) = match config_file::load_server_config(&args.config) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };
    let mut config = ServerConfig {
        fetch: config.fetch.with_env_agent(std::env::var(AGENT_ENV).ok()),
        ..config
    };

    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = config_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            args.config.display(),
            e
        );
    }

    if let Some(listen) = args.listen {
        config.host = listen.ip().to_string();
        config.port = listen.port();
    }
    tracing::info!("Configuration loaded: {:?}", config);

    if config.update.enabled {
        match process::run_updater(&config.update).await {
            Ok(output) => tracing::info!("Fetch tool update finished: {}", output.trim()),
            Err(e) => tracing::warn!("Fetch tool update failed: {}", e),
        }
    }

    match process::check_fetch_tool(&config.fetch.executable) {
        Some(path) => tracing::info!("Using fetch tool at {}", path.display()),
        None => tracing::warn!(
            "Fetch tool '{}' not found on PATH; stream requests will fail",
            config.fetch.executable
        ),
    }

    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| RelayError::Config(format!("Invalid listen address: {}", e)))?;

    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    tracing::info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "m3u8_restreamer={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
