//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Server configuration
//! - The stream relay and its registry of running relays
//! - The HTTP client used for playlist fetches
//! - The optional limiter on concurrently running relays

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::{RelayRegistry, StreamRelay};

/// Shared state handed to every request handler
pub struct AppState {
    pub config: ServerConfig,
    pub relay: StreamRelay,
    pub registry: Arc<RelayRegistry>,
    pub http_client: reqwest::Client,
    stream_slots: Option<Arc<Semaphore>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("m3u8-restreamer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let stream_slots = config
            .max_concurrent_streams
            .map(|max| Arc::new(Semaphore::new(max)));

        Ok(Self {
            relay: StreamRelay::new(config.fetch.clone()),
            registry: Arc::new(RelayRegistry::new()),
            http_client,
            stream_slots,
            config,
        })
    }

    /// Reserve a slot for one relay. `None` when relays are unlimited.
    pub fn acquire_stream_slot(&self) -> Result<Option<OwnedSemaphorePermit>> {
        match &self.stream_slots {
            None => Ok(None),
            Some(slots) => Arc::clone(slots)
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| RelayError::Unavailable("Too many concurrent streams".to_string())),
        }
    }
}
