//! Subprocess management
//!
//! - [`SubprocessHandle`]: one fetch-tool process with its output stream,
//!   diagnostic drain and termination
//! - startup tooling: fetch tool self-update and availability check

pub mod handle;
pub mod tooling;

pub use handle::SubprocessHandle;
pub use tooling::{check_fetch_tool, run_updater};
