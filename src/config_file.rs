//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section is optional;
//! missing values fall back to [`ServerConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{FetchConfig, ServerConfig, UpdateConfig};
use crate::error::{RelayError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// Fetch tool settings
    pub fetch: Option<FetchSettings>,
    /// Startup updater settings
    pub update: Option<UpdateSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Base URL written into rewritten playlists
    pub public_base_url: Option<String>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    pub executable: Option<String>,
    pub prefix_args: Option<Vec<String>>,
    pub downloader: Option<String>,
    pub grace_period_secs: Option<u64>,
    pub default_user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub enabled: Option<bool>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum concurrently running relays
    pub max_concurrent_streams: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let mut config = defaults.clone();

        if let Some(server) = self.server {
            config.host = server.host.unwrap_or(defaults.host);
            config.port = server.port.unwrap_or(defaults.port);
            config.public_base_url = server.public_base_url;
            config.cors_enabled = server.cors_enabled.unwrap_or(defaults.cors_enabled);
        }

        if let Some(fetch) = self.fetch {
            let base = FetchConfig::default();
            config.fetch = FetchConfig {
                executable: fetch.executable.unwrap_or(base.executable),
                prefix_args: fetch.prefix_args.unwrap_or(base.prefix_args),
                downloader: fetch.downloader.unwrap_or(base.downloader),
                grace_period_secs: fetch.grace_period_secs.unwrap_or(base.grace_period_secs),
                default_user_agent: fetch.default_user_agent.filter(|a| !a.is_empty()),
            };
        }

        if let Some(update) = self.update {
            let base = UpdateConfig::default();
            config.update = UpdateConfig {
                enabled: update.enabled.unwrap_or(base.enabled),
                program: update.program.unwrap_or(base.program),
                args: update.args.unwrap_or(base.args),
                timeout_secs: update.timeout_secs.unwrap_or(base.timeout_secs),
            };
        }

        if let Some(logging) = self.logging {
            config.log_level = logging.level.unwrap_or(defaults.log_level);
            config.log_format = logging.format.unwrap_or(defaults.log_format);
        }

        config.max_concurrent_streams = self.limits.and_then(|l| l.max_concurrent_streams);
        config
    }
}

/// Load the server configuration from `path`.
///
/// A missing file is not an error and yields the defaults.
pub fn load_server_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    Ok(ConfigFile::from_file(path)?.into_server_config())
}
