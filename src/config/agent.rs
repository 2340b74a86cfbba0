//! Machine agent configuration loading from agent.toml
//!
//! Every section and field has a default, so an empty or missing file yields
//! an agent that talks to `http://localhost:5275` and does nothing else until
//! a log folder, FTP target or monitor watch is configured.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Configuration structure representing the entire agent.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Server connection settings
    pub api: ApiSettings,
    /// Log collection settings
    pub logs: LogSettings,
    /// FTP target for backups
    pub ftp: FtpSettings,
    /// Backup source selection
    pub backup: BackupSettings,
    /// Value monitor settings
    pub monitor: MonitorSettings,
}

/// Server connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the API server
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Interval between heartbeats and command polls, in seconds
    pub heartbeat_secs: u64,
    /// IPv4 prefix preferred when the machine has several addresses
    pub preferred_ip_prefix: String,
    /// Name reported at registration; the hostname when absent
    pub machine_name: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5275".to_string(),
            timeout_secs: 30,
            heartbeat_secs: 30,
            preferred_ip_prefix: "10.224".to_string(),
            machine_name: None,
        }
    }
}

impl ApiSettings {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Heartbeat interval as a [`Duration`], at least one second
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

/// Log collection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Folder scanned for log files; collection is disabled when absent
    pub folder: Option<PathBuf>,
    /// Interval between scans, in seconds
    pub scan_secs: u64,
    /// Maximum number of entries per upload
    pub batch_size: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            folder: None,
            scan_secs: 60,
            batch_size: 500,
        }
    }
}

/// FTP target for backups
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FtpSettings {
    /// FTP server host name or address; backups are disabled when empty
    pub host: String,
    /// FTP control port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Remote directory uploads go to
    pub remote_dir: String,
}

impl Default for FtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 21,
            username: "anonymous".to_string(),
            password: String::new(),
            remote_dir: "/".to_string(),
        }
    }
}

/// Backup source selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Local folder to back up
    pub source: Option<PathBuf>,
    /// `;`-separated glob patterns (e.g., "*.log;*.csv")
    pub patterns: String,
    /// Descend into sub-folders
    pub recursive: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            source: None,
            patterns: "*.*".to_string(),
            recursive: true,
        }
    }
}

/// Value monitor settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Files whose content is watched for changes
    pub watch: Vec<WatchSettings>,
}

/// One watched value
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSettings {
    /// Identifier reported with change events
    pub identifier: String,
    /// File whose trimmed content is the watched value
    pub path: PathBuf,
    /// Poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

const fn default_interval_ms() -> u64 {
    1000
}

/// Loads agent configuration from a TOML file, falling back to defaults when
/// the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_agent_config<P: AsRef<Path>>(path: P) -> Result<AgentConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "Agent config not found, using defaults");
        return Ok(AgentConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read agent config: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse agent config: {e}"),
    })
}
