//! Owned handle around one fetch-tool subprocess.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::{RelayError, Result};

/// Maximum diagnostic text retained per process (1 MiB).
///
/// The pipe keeps being drained past this limit so the child never blocks
/// on a full stderr pipe; the excess is discarded.
const MAX_DIAGNOSTIC_BYTES: usize = 1024 * 1024;

/// Upper bound on joining the diagnostic drain once the process is gone.
/// A grandchild inheriting stderr can keep the pipe open indefinitely.
const DIAGNOSTIC_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A spawned subprocess with piped stdout and stderr.
///
/// The process is created with `kill_on_drop`, so dropping the handle on
/// any path (early return, panic, cancelled task) terminates it and leaves
/// reaping to the tokio runtime. The normal relay path kills and reaps
/// explicitly.
pub struct SubprocessHandle {
    program: String,
    child: Child,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    diagnostics: Option<JoinHandle<String>>,
    kills_issued: u32,
}

impl SubprocessHandle {
    /// Start `program` with `args`. Stdin is not connected.
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RelayError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let pid = child.id();
        let stdout = child.stdout.take();
        let diagnostics = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_diagnostics(stderr)));

        tracing::debug!("Spawned {} (pid {:?})", program, pid);

        Ok(Self {
            program: program.to_string(),
            child,
            pid,
            stdout,
            diagnostics,
            kills_issued: 0,
        })
    }

    /// OS process id, captured at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Program name this handle was spawned from
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Number of kill requests issued so far
    pub fn kills_issued(&self) -> u32 {
        self.kills_issued
    }

    /// Take the process's standard output. Returns `None` once taken.
    pub fn take_output(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Join the background stderr drain and return what it collected.
    ///
    /// Returns `None` when nothing was written. The drain is aborted if it
    /// does not finish within [`DIAGNOSTIC_JOIN_TIMEOUT`].
    pub async fn diagnostics(&mut self) -> Option<String> {
        let mut task = self.diagnostics.take()?;
        let text = match tokio::time::timeout(DIAGNOSTIC_JOIN_TIMEOUT, &mut task).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("Diagnostic drain for {} failed: {}", self.program, e);
                return None;
            }
            Err(_) => {
                tracing::debug!("Diagnostic drain for {} still open, aborting", self.program);
                task.abort();
                return None;
            }
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Wait up to `timeout` for the process to exit on its own.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!("Waiting for {} failed: {}", self.program, e);
                None
            }
            Err(_elapsed) => None,
        }
    }

    /// Request immediate termination.
    ///
    /// Safe to call on a process that has already exited: the error from
    /// signalling a finished process is logged and ignored.
    pub fn kill(&mut self) {
        self.kills_issued += 1;
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(
                "Kill of {} (pid {:?}) ignored: {}",
                self.program,
                self.pid,
                e
            );
        }
    }

    /// Block until the OS has reclaimed the process.
    pub async fn wait_reaped(&mut self) -> Option<ExitStatus> {
        match self.child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!("Reaping {} (pid {:?}) failed: {}", self.program, self.pid, e);
                None
            }
        }
    }
}

impl Drop for SubprocessHandle {
    fn drop(&mut self) {
        if let Some(task) = self.diagnostics.take() {
            task.abort();
        }
    }
}

/// Read `reader` to EOF, keeping at most [`MAX_DIAGNOSTIC_BYTES`].
async fn drain_diagnostics<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut collected = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = MAX_DIAGNOSTIC_BYTES.saturating_sub(collected.len());
                collected.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                tracing::debug!("Diagnostic stream read error: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&collected).into_owned()
}
