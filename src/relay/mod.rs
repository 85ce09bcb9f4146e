//! Stream relay
//!
//! Runs one fetch-tool subprocess per stream request and copies its output
//! to the client:
//! - client write failure: kill immediately, reap
//! - output EOF: give the process a grace window to exit, kill if it
//!   overstays, reap
//!
//! The subprocess is reaped before [`StreamRelay::run`] returns on every
//! path. If the relay future is dropped early, the handle's kill-on-drop
//! terminates the process.

pub mod command;
pub mod registry;

use serde::Serialize;
use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::FetchConfig;
use crate::error::Result;
use crate::process::SubprocessHandle;

pub use command::{FetchCommand, StreamRequest};
pub use registry::RelayRegistry;

/// Read size used when copying subprocess output to the client
const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// How a relay operation ended. Exactly one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayOutcome {
    /// Output drained and the process exited within the grace window
    GracefulEnd,
    /// Process overstayed the grace window and was killed
    ForcedEnd,
    /// Writing to the client failed; process killed without grace
    ClientDisconnected,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::GracefulEnd => "graceful_end",
            RelayOutcome::ForcedEnd => "forced_end",
            RelayOutcome::ClientDisconnected => "client_disconnected",
        }
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one finished relay operation
#[derive(Debug)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub bytes_relayed: u64,
    pub pid: Option<u32>,
    /// Exit status once reaped, `None` if waiting failed
    pub exit_status: Option<ExitStatus>,
    pub kills_issued: u32,
    /// Everything the process wrote to stderr, if anything
    pub diagnostics: Option<String>,
}

/// How the output copy stopped
enum CopyEnd {
    Eof,
    WriteFailed(std::io::Error),
}

/// Spawns and supervises fetch-tool subprocesses
#[derive(Debug, Clone)]
pub struct StreamRelay {
    fetch: FetchConfig,
    grace_period: Duration,
}

impl StreamRelay {
    pub fn new(fetch: FetchConfig) -> Self {
        let grace_period = fetch.grace_period();
        Self {
            fetch,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Fetch invocation for `request` under this relay's configuration
    pub fn command_for(&self, request: &StreamRequest) -> FetchCommand {
        FetchCommand::for_request(request, &self.fetch)
    }

    /// Start the fetch tool for `request`.
    pub fn spawn(&self, request: &StreamRequest) -> Result<SubprocessHandle> {
        let command = self.command_for(request);
        let agent = request.effective_agent(self.fetch.default_user_agent.as_deref());
        tracing::info!(
            "Got request to play stream {} with referer {} and agent {}. Starting: {}",
            request.target,
            request.referer.as_deref().unwrap_or(""),
            agent.unwrap_or(""),
            command
        );
        SubprocessHandle::spawn(&command.program, &command.args)
    }

    /// Relay `handle`'s output into `sink` and tear the process down.
    pub async fn run<W>(&self, mut handle: SubprocessHandle, mut sink: W) -> RelayReport
    where
        W: AsyncWrite + Unpin,
    {
        let pid = handle.pid();
        let mut bytes_relayed = 0u64;

        let copy_end = match handle.take_output() {
            Some(mut output) => copy_output(&mut output, &mut sink, &mut bytes_relayed).await,
            None => finish_sink(&mut sink).await,
        };
        drop(sink);

        let (outcome, exit_status) = match copy_end {
            CopyEnd::WriteFailed(e) => {
                tracing::info!(
                    "Client disconnected after {} bytes ({}). Killing stream process (pid {:?})",
                    bytes_relayed,
                    e,
                    pid
                );
                handle.kill();
                (RelayOutcome::ClientDisconnected, handle.wait_reaped().await)
            }
            CopyEnd::Eof => match handle.wait_for_exit(self.grace_period).await {
                Some(status) => (RelayOutcome::GracefulEnd, Some(status)),
                None => {
                    tracing::info!(
                        "Stream process (pid {:?}) still running {:?} after end of output, killing",
                        pid,
                        self.grace_period
                    );
                    handle.kill();
                    (RelayOutcome::ForcedEnd, handle.wait_reaped().await)
                }
            },
        };

        let diagnostics = handle.diagnostics().await;
        if let Some(text) = &diagnostics {
            tracing::warn!("{} (pid {:?}) reported: {}", handle.program(), pid, text.trim());
        }

        tracing::info!(
            "Stream finished: {} after {} bytes, exit status {:?}",
            outcome,
            bytes_relayed,
            exit_status
        );

        RelayReport {
            outcome,
            bytes_relayed,
            pid,
            exit_status,
            kills_issued: handle.kills_issued(),
            diagnostics,
        }
    }
}

/// Copy `reader` into `writer` until EOF or a write error.
///
/// A read error on the subprocess pipe ends the stream like EOF. On EOF the
/// writer is flushed and shut down so the client sees the end of the body.
async fn copy_output<R, W>(reader: &mut R, writer: &mut W, bytes_relayed: &mut u64) -> CopyEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Reading stream output failed: {}", e);
                break;
            }
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            return CopyEnd::WriteFailed(e);
        }
        *bytes_relayed += n as u64;
    }
    finish_sink(writer).await
}

async fn finish_sink<W: AsyncWrite + Unpin>(writer: &mut W) -> CopyEnd {
    if let Err(e) = writer.flush().await {
        return CopyEnd::WriteFailed(e);
    }
    match writer.shutdown().await {
        Ok(()) => CopyEnd::Eof,
        Err(e) => CopyEnd::WriteFailed(e),
    }
}
