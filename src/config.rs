//! Client configuration.
//!
//! Loaded from a TOML file; every field has a default so a file may set
//! only what it needs.
//!
//! ## Environment Variables
//!
//! - `TSDB_URL` - WebSocket endpoint
//! - `TSDB_USER` - User name
//! - `TSDB_PASSWORD` - Password
//! - `TSDB_DATABASE` - Default database

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::mux::MuxConfig;
use crate::driver::protocol::STMT2_BIND_HEAD_LEN;
use crate::driver::reconnect::{Handshake, ReconnectPolicy};
use crate::error::{DriverError, DriverResult};
use crate::stmt2::Stmt2Layout;

pub const ENV_URL: &str = "TSDB_URL";
pub const ENV_USER: &str = "TSDB_USER";
pub const ENV_PASSWORD: &str = "TSDB_PASSWORD";
pub const ENV_DATABASE: &str = "TSDB_DATABASE";

/// Which stmt2 payload layout bind calls use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramerVersion {
    V1,
    #[default]
    V2,
}

impl FramerVersion {
    pub fn layout(self) -> Stmt2Layout {
        match self {
            FramerVersion::V1 => Stmt2Layout::V1,
            FramerVersion::V2 => Stmt2Layout::V2 {
                binary_header_length: STMT2_BIND_HEAD_LEN,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,
}

fn default_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    2000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retries: default_retries(),
            interval_ms: default_retry_interval_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.enabled,
            retries: self.retries,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 0 disables keepalive pings.
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub stmt2_layout: FramerVersion,
}

fn default_url() -> String {
    "ws://localhost:6041".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "taosdata".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_keepalive_ms() -> u64 {
    30_000
}

fn default_queue_depth() -> usize {
    64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: default_user(),
            password: default_password(),
            database: None,
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            keepalive_ms: default_keepalive_ms(),
            queue_depth: default_queue_depth(),
            reconnect: ReconnectConfig::default(),
            stmt2_layout: FramerVersion::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> DriverResult<Self> {
        toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Reads a TOML file and applies `TSDB_*` environment overrides.
    pub fn load(path: &Path) -> DriverResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_URL) {
            if !url.is_empty() {
                self.url = url;
            }
        }
        if let Ok(user) = std::env::var(ENV_USER) {
            if !user.is_empty() {
                self.user = user;
            }
        }
        if let Ok(password) = std::env::var(ENV_PASSWORD) {
            self.password = password;
        }
        if let Ok(database) = std::env::var(ENV_DATABASE) {
            if !database.is_empty() {
                self.database = Some(database);
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            request_timeout: self.request_timeout(),
            keepalive: (self.keepalive_ms > 0).then(|| Duration::from_millis(self.keepalive_ms)),
            queue_depth: self.queue_depth,
        }
    }

    pub fn handshake(&self) -> Handshake {
        Handshake {
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}
