//! Playlist re-hosting
//!
//! - fetch a remote playlist document
//! - point nested sub-playlist URLs back at the relay's stream route
//!
//! Everything else in the document is passed through untouched.

pub mod fetch;
pub mod rewrite;

pub use fetch::fetch_playlist;
pub use rewrite::{rewrite_playlist, DEFAULT_PLAYLIST_CONTENT_TYPE};
