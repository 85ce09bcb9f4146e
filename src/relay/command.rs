//! Fetch tool invocation for a single stream request.

use std::fmt;

use crate::config::FetchConfig;
use crate::error::{RelayError, Result};

/// A client's request to relay one media stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Media resource handed to the fetch tool
    pub target: String,
    /// Referer forwarded to the origin
    pub referer: Option<String>,
    /// User agent forwarded to the origin
    pub agent: Option<String>,
}

impl StreamRequest {
    /// Build a request, rejecting a blank target or one that would read as
    /// a command line option.
    pub fn new(target: String, referer: Option<String>, agent: Option<String>) -> Result<Self> {
        if target.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "stream target URL is empty".to_string(),
            ));
        }
        if target.trim_start().starts_with('-') {
            return Err(RelayError::InvalidRequest(format!(
                "stream target URL must not start with '-': {}",
                target
            )));
        }
        Ok(Self {
            target,
            referer,
            agent,
        })
    }

    /// Agent to send: the request's own when non-empty, otherwise the
    /// configured default when non-empty.
    pub fn effective_agent<'a>(&'a self, default_agent: Option<&'a str>) -> Option<&'a str> {
        non_empty(self.agent.as_deref()).or_else(|| non_empty(default_agent))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Program and argument vector for one fetch tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl FetchCommand {
    /// Build the fetch invocation for `request`.
    ///
    /// Raw media goes to the tool's stdout (`-o -`). Referer and user agent
    /// flags are only added when they have a non-empty value. The target is
    /// always last, after `--`, so it is never parsed as an option.
    pub fn for_request(request: &StreamRequest, fetch: &FetchConfig) -> Self {
        let mut args = fetch.prefix_args.clone();
        args.extend([
            "-q".to_string(),
            "--no-warnings".to_string(),
            "--downloader".to_string(),
            fetch.downloader.clone(),
            "-o".to_string(),
            "-".to_string(),
        ]);

        if let Some(referer) = non_empty(request.referer.as_deref()) {
            args.push("--referer".to_string());
            args.push(referer.to_string());
        }

        if let Some(agent) = request.effective_agent(fetch.default_user_agent.as_deref()) {
            args.push("--user-agent".to_string());
            args.push(agent.to_string());
        }

        args.push("--".to_string());
        args.push(request.target.clone());

        Self {
            program: fetch.executable.clone(),
            args,
        }
    }
}

impl fmt::Display for FetchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
