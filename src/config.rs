use crate::muted_error;
use anyhow::Context;
use log::warn;
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed address shared by the debugger server and the transport client.
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:41222";
pub const DEFAULT_DLV_BINARY: &str = "dlv";

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the headless server listens on and the client connects to.
    pub listen: String,
    /// Debugger server binary, a path or a name looked up in `PATH`.
    pub dlv: PathBuf,
    pub connect_timeout_ms: u64,
    /// How long a closing session waits for an outstanding command.
    pub shutdown_timeout_ms: u64,
    /// Extra arguments forwarded to the server before the package path.
    pub build_flags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
            dlv: PathBuf::from(DEFAULT_DLV_BINARY),
            connect_timeout_ms: 5000,
            shutdown_timeout_ms: 5000,
            build_flags: vec![],
        }
    }
}

impl Config {
    const DEFAULT_PATH: &'static str = ".config/dlvctl/config.toml";

    /// Load configuration from a file.
    ///
    /// # Arguments
    ///
    /// * `path`: explicit config path, if `None` then default path in a home directory is used,
    ///   missing or malformed default file results in a default configuration
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let data = read_to_string(path)
                    .with_context(|| format!("read config file {}", path.display()))?;
                Self::from_toml(&data).with_context(|| format!("parse {}", path.display()))
            }
            None => {
                let Some(home) = home::home_dir() else {
                    return Ok(Self::default());
                };
                let Some(data) = muted_error!(read_to_string(home.join(Self::DEFAULT_PATH))) else {
                    return Ok(Self::default());
                };
                match Self::from_toml(&data) {
                    Ok(cfg) => Ok(cfg),
                    Err(e) => {
                        warn!(target: "dlvctl", "ignore malformed config file: {e:#}");
                        Ok(Self::default())
                    }
                }
            }
        }
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        Ok(toml::de::from_str(data)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
