//! Agent configuration.
//!
//! Stored as TOML at `$REMOTEFS_CONFIG`, or `~/.config/remotefs/agent.toml`
//! when the variable is unset. A missing file is created with defaults.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use remotefs_protocol::constants::{DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_HIGH_WATER_MARK};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "REMOTEFS_CONFIG";

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem name reported to peers (hostname by default).
    #[serde(default = "default_name")]
    pub name: String,

    /// Host directory served as `/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Address the WebSocket server binds.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// WebSocket server port (0 = auto-assign).
    #[serde(default)]
    pub port: u16,

    /// Bytes per `data` chunk on read streams.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Queued bytes after which write streams report `drain`.
    #[serde(default = "default_write_high_water_mark")]
    pub write_high_water_mark: usize,
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "remotefs".into())
}

fn default_root() -> PathBuf {
    home_dir().join("remotefs")
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_write_high_water_mark() -> usize {
    DEFAULT_WRITE_HIGH_WATER_MARK
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            root: default_root(),
            bind: default_bind(),
            port: 0,
            read_buffer_size: default_read_buffer_size(),
            write_high_water_mark: default_write_high_water_mark(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".into()))
}

fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => PathBuf::from(path),
        None => home_dir().join(".config").join("remotefs").join("agent.toml"),
    }
}
