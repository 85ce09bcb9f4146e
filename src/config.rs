//! Server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the default user agent for the fetch tool
pub const AGENT_ENV: &str = "AGENT";

/// Fetch tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Fetch executable (looked up on PATH)
    pub executable: String,

    /// Arguments placed before the fetch flags, e.g. `-m yt_dlp` when
    /// `executable` is a Python interpreter
    pub prefix_args: Vec<String>,

    /// Downloader the fetch tool should delegate to
    pub downloader: String,

    /// Seconds the subprocess may take to exit after its output ends
    pub grace_period_secs: u64,

    /// User agent used when a request does not carry one
    pub default_user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            executable: "yt-dlp".to_string(),
            prefix_args: Vec::new(),
            downloader: "ffmpeg".to_string(),
            grace_period_secs: 5,
            default_user_agent: None,
        }
    }
}

impl FetchConfig {
    /// Grace window applied after the subprocess output reaches EOF
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Apply the environment default agent. A non-empty value overrides
    /// whatever the config file set.
    pub fn with_env_agent(mut self, env_agent: Option<String>) -> Self {
        if let Some(agent) = env_agent.filter(|a| !a.is_empty()) {
            self.default_user_agent = Some(agent);
        }
        self
    }
}

/// Startup self-update of the fetch tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Run the updater before serving
    pub enabled: bool,

    /// Updater program
    pub program: String,

    /// Updater arguments
    pub args: Vec<String>,

    /// Maximum time the updater may run
    pub timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "pip3".to_string(),
            args: vec![
                "install".to_string(),
                "--upgrade".to_string(),
                "yt-dlp".to_string(),
            ],
            timeout_secs: 120,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Scheme and authority used in rewritten playlists. Derived from the
    /// request when unset.
    pub public_base_url: Option<String>,

    /// Fetch tool configuration
    pub fetch: FetchConfig,

    /// Startup updater configuration
    pub update: UpdateConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Maximum concurrently running relays
    pub max_concurrent_streams: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 11034,
            public_base_url: None,
            fetch: FetchConfig::default(),
            update: UpdateConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            max_concurrent_streams: None,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
