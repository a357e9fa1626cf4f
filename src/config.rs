// src/config.rs

//! Manages client configuration: compiled-in defaults, optional TOML overrides, and validation.

use crate::core::encoding::TextEncoding;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

/// Everything the client needs to know before it opens a session.
///
/// Every field has a default, so an empty file (or no file at all) yields the
/// stock settings: `localhost:8010`, a ping every 50 seconds, and the locale's
/// text encoding.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Overrides the encoding otherwise taken from the OS locale.
    #[serde(default)]
    pub encoding: Option<String>,

    /// Time between liveness probes.
    #[serde(with = "humantime_serde", default = "default_ping_interval")]
    pub ping_interval: Duration,

    /// How long a probe waits for its reply. Defaults to the ping interval.
    #[serde(with = "humantime_serde", default)]
    pub pong_timeout: Option<Duration>,

    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Pause between tearing a session down and reconnecting.
    #[serde(with = "humantime_serde", default = "default_reconnect_delay")]
    pub reconnect_delay: Duration,

    /// Upper bound on waiting for background tasks while closing a session.
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8010
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_ping_interval() -> Duration {
    Duration::from_secs(50)
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_reconnect_delay() -> Duration {
    Duration::from_secs(2)
}
fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            encoding: None,
            ping_interval: default_ping_interval(),
            pong_timeout: None,
            connect_timeout: default_connect_timeout(),
            reconnect_delay: default_reconnect_delay(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config =
            Self::from_toml(&contents).with_context(|| format!("Invalid config file '{path}'"))?;
        info!("Loaded configuration from '{}'", path);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.ping_interval.is_zero() {
            return Err(anyhow!("ping_interval cannot be 0"));
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout cannot be 0"));
        }
        if let Some(timeout) = self.pong_timeout {
            if timeout.is_zero() {
                return Err(anyhow!("pong_timeout cannot be 0"));
            }
            if timeout > self.ping_interval {
                warn!(
                    "pong_timeout ({:?}) is longer than ping_interval ({:?}); probes may queue up behind a slow reply.",
                    timeout, self.ping_interval
                );
            }
        }
        if let Some(label) = &self.encoding {
            TextEncoding::from_label(label)?;
        }
        Ok(())
    }

    /// The reply deadline for a liveness probe.
    pub fn effective_pong_timeout(&self) -> Duration {
        self.pong_timeout.unwrap_or(self.ping_interval)
    }

    /// Decides the session encoding once: the configured override if present,
    /// otherwise the OS locale.
    pub fn resolve_encoding(&self) -> Result<TextEncoding> {
        match &self.encoding {
            Some(label) => Ok(TextEncoding::from_label(label)?),
            None => Ok(TextEncoding::from_locale()),
        }
    }
}
