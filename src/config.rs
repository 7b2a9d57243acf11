//! Configuration for the `ttyctl` key viewer.
//!
//! Loaded from `~/.ttyctl/config.toml`; a missing or unreadable file means
//! defaults:
//!
//! ```toml
//! # Terminal device (POSIX only)
//! device = "/dev/tty"
//!
//! # trace, debug, info, warn, error
//! log_level = "info"
//!
//! # How long to wait for a key before checking signals
//! poll_interval_ms = 250
//!
//! # black, red, green, yellow, blue, magenta, cyan, white, default
//! status_color = "cyan"
//!
//! [status]
//! show_size = true
//! wrap = false
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::device::Color;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Terminal device path
    pub device: String,
    /// Log level for the log file
    pub log_level: String,
    /// Input poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Status line color
    pub status_color: Color,
    /// Status line settings
    pub status: StatusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device().to_string(),
            log_level: "info".to_string(),
            poll_interval_ms: 250,
            status_color: Color::Cyan,
            status: StatusConfig::default(),
        }
    }
}

/// Status line configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub show_size: bool,
    /// Leave autowrap on while the status line is drawn
    pub wrap: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            show_size: true,
            wrap: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = Self::from_toml(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Directory holding the config file and the log file
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".ttyctl"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }
}

#[cfg(any(unix, windows))]
fn default_device() -> &'static str {
    crate::backend::DEFAULT_DEVICE
}

#[cfg(not(any(unix, windows)))]
fn default_device() -> &'static str {
    "/dev/tty"
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
