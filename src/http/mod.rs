//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the relay and playlist routes
//! - Stream relay handler (subprocess output as a streamed body)
//! - Playlist conversion handler
//! - Health, version and debug endpoints
//! - CORS and request tracing middleware

pub mod convert;
pub mod handlers;
pub mod routes;
pub mod streams;

pub use routes::create_router;
