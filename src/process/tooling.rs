//! Startup-time fetch tool maintenance: optional self-update and an
//! availability check.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::UpdateConfig;
use crate::error::{RelayError, Result};

/// Run the configured updater command once, bounded by its timeout.
///
/// Returns the updater's standard output. Callers treat failure as
/// non-fatal.
pub async fn run_updater(update: &UpdateConfig) -> Result<String> {
    let timeout = Duration::from_secs(update.timeout_secs);
    tracing::info!("Updating fetch tool: {} {}", update.program, update.args.join(" "));

    let mut cmd = Command::new(&update.program);
    cmd.args(&update.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(RelayError::Spawn {
                program: update.program.clone(),
                source,
            })
        }
        Err(_) => {
            return Err(RelayError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} timed out after {}s", update.program, timeout.as_secs()),
            )))
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        return Err(RelayError::Io(std::io::Error::other(format!(
            "{} exited with {}: {}",
            update.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))));
    }
    Ok(stdout)
}

/// Resolve the fetch executable on PATH.
pub fn check_fetch_tool(executable: &str) -> Option<PathBuf> {
    which::which(executable).ok()
}
